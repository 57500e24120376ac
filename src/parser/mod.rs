//! Decoders for the opaque blobs a message row carries: the typedstream
//! attributed body, property lists, and the summary-info edit state.

pub mod archivable;
pub mod body;
pub mod edited;
pub mod plist;
pub mod typedstream;
