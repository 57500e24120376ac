//! Decoded archiver values: classes, primitive payloads and the tagged
//! [`Archivable`] union stored in the decoder's object table.

/// A class reference decoded from a typedstream: name plus archiver version.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub version: u32,
}

impl Class {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// A primitive value carried in an object's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Class(Class),
    Unknown(u8),
}

/// One entry of the decoder's object table, or a top-level decode result.
///
/// Back-references into the table share entries by index; the table owns
/// every value. A `Placeholder` is reserved when an object type tag is seen
/// and is always overwritten before the decode returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Archivable {
    /// Reserved slot for an object whose class and payload are not yet known.
    Placeholder,
    /// An embedded type signature recorded in the object table.
    Types(Vec<Type>),
    /// A bare class reference (one link of an inheritance chain).
    Class(Class),
    /// Payload values not attached to any class.
    Data(Vec<Value>),
    /// A fully decoded object: class plus payload.
    Object(Class, Vec<Value>),
}

impl Archivable {
    /// The object's string payload, when it is an archived string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Archivable::Object(class, data)
                if class.name == "NSString" || class.name == "NSMutableString" =>
            {
                match data.first() {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The object's integer payload, when it is an archived number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Archivable::Object(class, data) if class.name == "NSNumber" => match data.first() {
                Some(Value::SignedInt(n)) => Some(*n),
                _ => None,
            },
            _ => None,
        }
    }

    /// The object's floating-point payload, when it is an archived number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Archivable::Object(class, data) if class.name == "NSNumber" => match data.first() {
                Some(Value::Double(f)) => Some(*f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interpret a two-value `Data` block as a range descriptor:
    /// `(start_offset, length)`.
    pub fn range(&self) -> Option<(i64, u64)> {
        match self {
            Archivable::Data(values) if values.len() == 2 => {
                match (values.first(), values.get(1)) {
                    (Some(Value::SignedInt(start)), Some(Value::UnsignedInt(length))) => {
                        Some((*start, *length))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Number of key/value entries carried by an archived dictionary,
    /// counted as individual components (`entries × 2`).
    pub fn dictionary_len(&self) -> usize {
        match self {
            Archivable::Object(class, data) if class.name == "NSDictionary" => match data.first() {
                Some(Value::SignedInt(n)) if *n > 0 => (*n as usize) * 2,
                _ => 0,
            },
            _ => 0,
        }
    }
}

/// The user-visible string of a decoded attributed body: the first component.
pub fn text_from_components(components: &[Archivable]) -> Option<&str> {
    components.first().and_then(Archivable::as_string)
}

/// Primitive type tags found in a type descriptor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Utf8String,
    EmbeddedData,
    Object,
    SignedInt,
    UnsignedInt,
    Float,
    Double,
    /// A literal string registered in the types table (class names land
    /// there so type back-references stay index-aligned).
    String,
    Array,
    Unknown,
}

/// One decoded type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub tag: TypeTag,
    /// Literal value for `String` descriptors.
    pub string_value: String,
    /// Element count for `Array` descriptors.
    pub array_size: usize,
    /// The raw byte for `Unknown` descriptors.
    pub unknown_byte: u8,
}

impl Type {
    pub fn from_byte(input: u8) -> Self {
        let tag = match input {
            0x40 => TypeTag::Object,
            0x2B => TypeTag::Utf8String,
            0x2A => TypeTag::EmbeddedData,
            0x66 => TypeTag::Float,
            0x64 => TypeTag::Double,
            0x63 | 0x69 | 0x6C | 0x71 | 0x73 => TypeTag::SignedInt,
            0x43 | 0x49 | 0x4C | 0x51 | 0x53 => TypeTag::UnsignedInt,
            _ => {
                return Self {
                    tag: TypeTag::Unknown,
                    string_value: String::new(),
                    array_size: 0,
                    unknown_byte: input,
                }
            }
        };
        Self {
            tag,
            string_value: String::new(),
            array_size: 0,
            unknown_byte: 0,
        }
    }

    pub fn array(size: usize) -> Self {
        Self {
            tag: TypeTag::Array,
            string_value: String::new(),
            array_size: size,
            unknown_byte: 0,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            tag: TypeTag::String,
            string_value: value.into(),
            array_size: 0,
            unknown_byte: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nsstring(s: &str) -> Archivable {
        Archivable::Object(
            Class::new("NSString", 1),
            vec![Value::String(s.to_string())],
        )
    }

    #[test]
    fn test_as_string_matches_string_classes() {
        assert_eq!(nsstring("hi").as_string(), Some("hi"));
        let mutable = Archivable::Object(
            Class::new("NSMutableString", 1),
            vec![Value::String("hi".to_string())],
        );
        assert_eq!(mutable.as_string(), Some("hi"));
        let number = Archivable::Object(Class::new("NSNumber", 0), vec![Value::SignedInt(1)]);
        assert_eq!(number.as_string(), None);
        assert_eq!(Archivable::Placeholder.as_string(), None);
    }

    #[test]
    fn test_range_requires_two_values() {
        let range = Archivable::Data(vec![Value::SignedInt(3), Value::UnsignedInt(7)]);
        assert_eq!(range.range(), Some((3, 7)));
        let short = Archivable::Data(vec![Value::SignedInt(3)]);
        assert_eq!(short.range(), None);
        assert_eq!(nsstring("x").range(), None);
    }

    #[test]
    fn test_dictionary_len_doubles_entries() {
        let dict = Archivable::Object(Class::new("NSDictionary", 0), vec![Value::SignedInt(3)]);
        assert_eq!(dict.dictionary_len(), 6);
        let empty = Archivable::Object(Class::new("NSDictionary", 0), vec![Value::SignedInt(0)]);
        assert_eq!(empty.dictionary_len(), 0);
    }

    #[test]
    fn test_type_from_byte_table() {
        assert_eq!(Type::from_byte(0x40).tag, TypeTag::Object);
        assert_eq!(Type::from_byte(0x2B).tag, TypeTag::Utf8String);
        assert_eq!(Type::from_byte(0x2A).tag, TypeTag::EmbeddedData);
        assert_eq!(Type::from_byte(0x66).tag, TypeTag::Float);
        assert_eq!(Type::from_byte(0x64).tag, TypeTag::Double);
        for byte in [0x63, 0x69, 0x6C, 0x71, 0x73] {
            assert_eq!(Type::from_byte(byte).tag, TypeTag::SignedInt);
        }
        for byte in [0x43, 0x49, 0x4C, 0x51, 0x53] {
            assert_eq!(Type::from_byte(byte).tag, TypeTag::UnsignedInt);
        }
        let unknown = Type::from_byte(0x7E);
        assert_eq!(unknown.tag, TypeTag::Unknown);
        assert_eq!(unknown.unknown_byte, 0x7E);
    }
}
