//! Centralized error types for msgbridge.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while decoding a typedstream byte blob.
///
/// All variants are unrecoverable for the blob being decoded, but never for
/// the enclosing message: the caller downgrades them according to the
/// policy in [`crate::db::scan`].
#[derive(Error, Debug)]
pub enum StreamError {
    /// The stream did not start with the expected archiver header.
    #[error("invalid header: [version: {version}, signature: {signature}, system version: {system_version}]")]
    BadHeader {
        version: u64,
        signature: String,
        system_version: i64,
    },

    /// A read ran past the end of the buffer.
    #[error("unexpected end of stream at offset {index} (length {length})")]
    UnexpectedEof { index: usize, length: usize },

    /// A byte where a back-reference was expected was below the reference tag.
    #[error("pointer byte {byte:#04x} below reference tag at offset {index}")]
    BadPointer { index: usize, byte: u8 },

    /// A back-reference resolved outside the object table.
    #[error("reference {reference} outside object table of length {length}")]
    BadReference { reference: usize, length: usize },

    /// An array type descriptor declared zero elements.
    #[error("zero length array in type descriptor: {descriptor}")]
    ZeroLengthArray { descriptor: String },
}

/// Errors produced while reading a property-list blob.
#[derive(Error, Debug)]
pub enum PlistError {
    /// The underlying plist decoder rejected the blob.
    #[error("decoding property list: {0}")]
    Decode(#[from] plist::Error),

    /// A required key was absent.
    #[error("no '{key}' key in property list dictionary")]
    MissingKey { key: String },

    /// A key was present but held the wrong type.
    #[error("'{key}' is not a {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Errors produced while rendering a message into parts.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The attachment file could not be read from disk.
    #[error("reading attachment '{path}': {source}")]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The injected uploader rejected the media.
    #[error("uploading media failed: {0}")]
    Upload(String),
}

/// Top-level error for the scanner, watcher and CLI.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// SQLite error from the chat database.
    #[error("chat database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The message or attachment table had an unrecognized shape.
    #[error("unrecognized chat database schema: {reason}")]
    UnknownSchema { reason: String },

    /// A typedstream blob failed to decode.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A property-list blob failed to decode.
    #[error(transparent)]
    Plist(#[from] PlistError),

    /// The tapback target column had an unrecognized format.
    #[error("malformed tapback target: '{target}'")]
    TapbackMalformed { target: String },

    /// The filesystem watcher could not be set up.
    #[error("filesystem watcher error: {0}")]
    Watch(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

impl BridgeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl PlistError {
    pub fn missing(key: &str) -> Self {
        Self::MissingKey { key: key.into() }
    }

    pub fn wrong_type(key: &str, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
        }
    }
}
