use std::borrow::Cow;

/// A single physical value read back from an array.
///
/// Temporal and decimal values are represented by their underlying integer
/// storage. Values wider than 8 bytes (128-bit decimals, month-day-nano
/// intervals, 256-bit decimals) are returned as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue<'a> {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float16(half::f16),
    Float32(f32),
    Float64(f64),
    /// Fixed size or wide primitive bytes.
    FixedBytes(Cow<'a, [u8]>),
    Utf8(Cow<'a, str>),
    Binary(Cow<'a, [u8]>),
    List(Vec<ScalarValue<'a>>),
    Struct(Vec<ScalarValue<'a>>),
    Union {
        type_id: i8,
        value: Box<ScalarValue<'a>>,
    },
}

impl<'a> From<&'a str> for ScalarValue<'a> {
    fn from(value: &'a str) -> Self {
        ScalarValue::Utf8(Cow::Borrowed(value))
    }
}
