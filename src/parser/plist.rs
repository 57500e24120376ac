//! Thin adapter over property-list blobs: decode to a generic tree and
//! expose typed lookups with explicit errors.

use std::io::Cursor;

use plist::{Dictionary, Value};

use crate::error::PlistError;

/// Decode a property-list blob (binary or XML, auto-detected) into its
/// top-level dictionary.
pub fn decode_dictionary(blob: &[u8]) -> Result<Dictionary, PlistError> {
    let value = Value::from_reader(Cursor::new(blob))?;
    match value {
        Value::Dictionary(dict) => Ok(dict),
        _ => Err(PlistError::wrong_type("<root>", "dictionary")),
    }
}

/// Look up a required dictionary-valued key.
pub fn as_map<'a>(input: &'a Dictionary, key: &str) -> Result<&'a Dictionary, PlistError> {
    input
        .get(key)
        .ok_or_else(|| PlistError::missing(key))?
        .as_dictionary()
        .ok_or_else(|| PlistError::wrong_type(key, "dictionary"))
}

/// Look up a required array-valued key.
pub fn as_array<'a>(input: &'a Dictionary, key: &str) -> Result<&'a [Value], PlistError> {
    input
        .get(key)
        .ok_or_else(|| PlistError::missing(key))?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| PlistError::wrong_type(key, "array"))
}

/// Look up a required floating-point key.
pub fn as_f64(input: &Dictionary, key: &str) -> Result<f64, PlistError> {
    input
        .get(key)
        .ok_or_else(|| PlistError::missing(key))?
        .as_real()
        .ok_or_else(|| PlistError::wrong_type(key, "real"))
}

/// Look up a required data-valued key.
pub fn as_bytes<'a>(input: &'a Dictionary, key: &str) -> Result<&'a [u8], PlistError> {
    input
        .get(key)
        .ok_or_else(|| PlistError::missing(key))?
        .as_data()
        .ok_or_else(|| PlistError::wrong_type(key, "data"))
}

/// Look up a required string-valued key.
pub fn as_string<'a>(input: &'a Dictionary, key: &str) -> Result<&'a str, PlistError> {
    input
        .get(key)
        .ok_or_else(|| PlistError::missing(key))?
        .as_string()
        .ok_or_else(|| PlistError::wrong_type(key, "string"))
}
