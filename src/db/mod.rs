//! Read-only access to the chat database.

pub mod queries;
pub mod scan;

pub use scan::MessageStore;
