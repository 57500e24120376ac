//! Shared test fixtures: a byte-level builder for archiver streams.
//!
//! Used by the unit tests and the integration tests to assemble valid
//! `streamtyped` blobs without hex-dumping them by hand.

/// Sequentially appends archiver constructs to a byte buffer.
///
/// Every emitted object spells out its class chain in full; the decoder's
/// back-reference handling is exercised separately with hand-built bytes.
pub struct StreamBuilder {
    bytes: Vec<u8>,
}

impl StreamBuilder {
    /// Start a stream with the standard header
    /// (version 4, `streamtyped`, system 1000).
    pub fn new() -> Self {
        let mut bytes = vec![0x04, 0x0B];
        bytes.extend_from_slice(b"streamtyped");
        bytes.extend_from_slice(&[0x81, 0xE8, 0x03]);
        Self { bytes }
    }

    /// Append an archived string object.
    pub fn string(mut self, text: &str) -> Self {
        self.object_class("NSString", 1);
        self.type_list(&[0x2B]);
        self.unsigned(text.len() as u64);
        self.bytes.extend_from_slice(text.as_bytes());
        self
    }

    /// Append a range descriptor: `{start_offset, length}`.
    pub fn range(mut self, start: i64, length: u64) -> Self {
        self.type_list(&[0x69, 0x49]);
        self.signed(start);
        self.unsigned(length);
        self
    }

    /// Append an archived dictionary marker with the given entry count.
    pub fn dictionary(mut self, entries: i64) -> Self {
        self.object_class("NSDictionary", 0);
        self.type_list(&[0x69]);
        self.signed(entries);
        self
    }

    /// Append an archived integer number.
    pub fn number_int(mut self, value: i64) -> Self {
        self.object_class("NSNumber", 0);
        self.type_list(&[0x69]);
        self.signed(value);
        self
    }

    /// Append an archived double-precision number.
    pub fn number_double(mut self, value: f64) -> Self {
        self.object_class("NSNumber", 0);
        self.type_list(&[0x64]);
        self.bytes.push(0x83);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Terminate the stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x86);
        self.bytes
    }

    /// Object tag plus an inline class chain with no superclasses.
    fn object_class(&mut self, name: &str, version: u8) {
        self.type_list(&[0x40]);
        self.bytes.extend_from_slice(&[0x84, 0x84]);
        self.bytes.push(name.len() as u8);
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(&[version, 0x85]);
    }

    fn type_list(&mut self, tags: &[u8]) {
        self.bytes.push(0x84);
        self.bytes.push(tags.len() as u8);
        self.bytes.extend_from_slice(tags);
    }

    /// Inline unsigned int, tagged 16-bit when it does not fit a bare byte.
    fn unsigned(&mut self, value: u64) {
        if value < 0x81 {
            self.bytes.push(value as u8);
        } else {
            self.bytes.push(0x81);
            self.bytes.extend_from_slice(&(value as u16).to_le_bytes());
        }
    }

    fn signed(&mut self, value: i64) {
        if (0..0x81).contains(&value) {
            self.bytes.push(value as u8);
        } else {
            self.bytes.push(0x81);
            self.bytes.extend_from_slice(&(value as i16).to_le_bytes());
        }
    }
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream holding a single archived string, the shape of the simplest
/// attributed body.
pub fn string_stream(text: &str) -> Vec<u8> {
    StreamBuilder::new().string(text).finish()
}
