//! Decoding of format strings into layouts.
//!
//! Format strings follow the grammar of the Arrow C data interface. Decoding
//! dispatches on the first character, then on the following characters for
//! nested and temporal types.
use std::str::FromStr;

use columnar_error::{not_implemented, ColumnarError, Result};
use tracing::trace;

use crate::datatype::{ArrowType, IntervalUnit, TimeUnit, UnionTypeIds};
use crate::layout::Layout;

/// Decode a format string into a buffer layout.
pub fn parse_format(format: &str) -> Result<Layout> {
    let datatype = parse_arrow_type(format)?;
    let layout = Layout::new(datatype);
    layout.validate()?;

    trace!(%format, category = ?layout.category, n_buffers = layout.n_buffers, "decoded format");

    Ok(layout)
}

impl FromStr for ArrowType {
    type Err = ColumnarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_arrow_type(s)
    }
}

/// Decode a format string into a logical type.
pub fn parse_arrow_type(format: &str) -> Result<ArrowType> {
    let bytes = format.as_bytes();
    let first = match bytes.first() {
        Some(b) => *b,
        None => return Err(ColumnarError::new("`format` had zero characters")),
    };

    if bytes.len() == 1 {
        if let Some(datatype) = single_char_type(first) {
            return Ok(datatype);
        }
    }

    match first {
        b'w' => parse_fixed_size_binary(format),
        b'd' => parse_decimal(format),
        b'+' => parse_nested(format),
        b't' => parse_temporal(format),
        b'v' if format == "vu" || format == "vz" => {
            not_implemented!("binary view format string: '{format}'")
        }
        _ => Err(unknown_format(format)),
    }
}

fn single_char_type(c: u8) -> Option<ArrowType> {
    Some(match c {
        b'n' => ArrowType::Null,
        b'b' => ArrowType::Boolean,
        b'c' => ArrowType::Int8,
        b'C' => ArrowType::UInt8,
        b's' => ArrowType::Int16,
        b'S' => ArrowType::UInt16,
        b'i' => ArrowType::Int32,
        b'I' => ArrowType::UInt32,
        b'l' => ArrowType::Int64,
        b'L' => ArrowType::UInt64,
        b'e' => ArrowType::Float16,
        b'f' => ArrowType::Float32,
        b'g' => ArrowType::Float64,
        b'z' => ArrowType::Binary,
        b'u' => ArrowType::Utf8,
        b'Z' => ArrowType::LargeBinary,
        b'U' => ArrowType::LargeUtf8,
        _ => return None,
    })
}

fn unknown_format(format: &str) -> ColumnarError {
    ColumnarError::new(format!("Unknown format string: '{format}'"))
}

/// Parse a string made up entirely of ascii digits.
///
/// Signs, whitespace and empty strings are rejected.
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Largest fixed size binary width or fixed size list size.
const MAX_FIXED_SIZE: usize = i32::MAX as usize;

fn parse_fixed_size_binary(format: &str) -> Result<ArrowType> {
    let width = format
        .strip_prefix("w:")
        .and_then(parse_digits::<usize>)
        .filter(|width| (1..=MAX_FIXED_SIZE).contains(width));

    match width {
        Some(width) => Ok(ArrowType::FixedSizeBinary { width }),
        None => Err(ColumnarError::new(format!(
            "Expected format 'w:<width>' but got '{format}'"
        ))),
    }
}

fn parse_decimal(format: &str) -> Result<ArrowType> {
    let err = || {
        ColumnarError::new(format!(
            "Expected format 'd:<precision>,<scale>[,<bitwidth>]' but got '{format}'"
        ))
    };

    let rest = format.strip_prefix("d:").ok_or_else(err)?;
    let mut parts = rest.split(',');

    let precision = parts
        .next()
        .and_then(parse_digits::<u8>)
        .filter(|p| *p > 0)
        .ok_or_else(err)?;

    let scale = match parts.next() {
        Some(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            parse_digits::<u8>(digits).and_then(|_| s.parse::<i8>().ok())
        }
        None => None,
    }
    .ok_or_else(err)?;

    let bit_width = match parts.next() {
        Some(s) => parse_digits::<u16>(s)
            .filter(|w| matches!(w, 32 | 64 | 128 | 256))
            .ok_or_else(err)?,
        None => 128,
    };

    if parts.next().is_some() {
        return Err(err());
    }

    Ok(ArrowType::Decimal {
        precision,
        scale,
        bit_width,
    })
}

fn parse_nested(format: &str) -> Result<ArrowType> {
    let bytes = format.as_bytes();

    match (bytes.get(1), bytes.len()) {
        (Some(b'l'), 2) => Ok(ArrowType::List),
        (Some(b'L'), 2) => Ok(ArrowType::LargeList),
        (Some(b's'), 2) => Ok(ArrowType::Struct),
        (Some(b'm'), 2) => Ok(ArrowType::Map),
        (Some(b'w'), 2) => Ok(ArrowType::FixedSizeList { size: 1 }),
        (Some(b'w'), _) => {
            let size = format
                .strip_prefix("+w:")
                .and_then(parse_digits::<usize>)
                .filter(|size| (1..=MAX_FIXED_SIZE).contains(size));
            match size {
                Some(size) => Ok(ArrowType::FixedSizeList { size }),
                None => Err(ColumnarError::new(format!(
                    "Expected format '+w:<size>' but got '{format}'"
                ))),
            }
        }
        (Some(b'u'), _) => parse_union(format),
        (Some(b'r'), 2) => not_implemented!("run end encoded format string: '{format}'"),
        (Some(b'v'), 3) if bytes[2] == b'l' || bytes[2] == b'L' => {
            not_implemented!("list view format string: '{format}'")
        }
        _ => Err(unknown_format(format)),
    }
}

fn parse_union(format: &str) -> Result<ArrowType> {
    let bytes = format.as_bytes();
    let dense = match bytes.get(2) {
        Some(b'd') => true,
        Some(b's') => false,
        _ => {
            return Err(ColumnarError::new(format!(
                "Invalid union format string: '{format}'"
            )))
        }
    };

    // Safe to slice, first three bytes are ascii.
    let type_ids = match &format[3..] {
        "" => None,
        rest => match rest.strip_prefix(':') {
            Some(ids) => Some(parse_union_type_ids(format, ids)?),
            None => {
                return Err(ColumnarError::new(format!(
                    "Invalid union format string: '{format}'"
                )))
            }
        },
    };

    if dense {
        Ok(ArrowType::DenseUnion { type_ids })
    } else {
        Ok(ArrowType::SparseUnion { type_ids })
    }
}

fn parse_union_type_ids(format: &str, ids: &str) -> Result<UnionTypeIds> {
    let mut type_ids = UnionTypeIds::new();
    if ids.is_empty() {
        return Ok(type_ids);
    }

    for id in ids.split(',') {
        let id = parse_digits::<i8>(id).ok_or_else(|| {
            ColumnarError::new(format!(
                "Invalid union type id '{id}' in format string: '{format}'"
            ))
        })?;
        if type_ids.contains(&id) {
            return Err(ColumnarError::new(format!(
                "Duplicate union type id {id} in format string: '{format}'"
            )));
        }
        type_ids.push(id);
    }

    Ok(type_ids)
}

fn parse_temporal(format: &str) -> Result<ArrowType> {
    let bytes = format.as_bytes();
    let unit = bytes.get(2).copied();
    let exact = bytes.len() == 3;

    match bytes.get(1) {
        Some(b'd') => match unit {
            Some(b'D') if exact => Ok(ArrowType::Date32),
            Some(b'm') if exact => Ok(ArrowType::Date64),
            _ => Err(ColumnarError::new(format!(
                "Invalid date format string: '{format}'"
            ))),
        },
        Some(b't') => match unit.and_then(TimeUnit::from_format_char) {
            Some(unit @ (TimeUnit::Second | TimeUnit::Millisecond)) if exact => {
                Ok(ArrowType::Time32(unit))
            }
            Some(unit) if exact => Ok(ArrowType::Time64(unit)),
            _ => Err(ColumnarError::new(format!(
                "Invalid time of day format string: '{format}'"
            ))),
        },
        Some(b's') => {
            let err = || ColumnarError::new(format!("Invalid timestamp format string: '{format}'"));
            let unit = unit.and_then(TimeUnit::from_format_char).ok_or_else(err)?;
            // Safe to slice, first three bytes are ascii.
            let timezone = match format[3..].strip_prefix(':') {
                Some("") => None,
                Some(tz) => Some(tz.to_string()),
                None => return Err(err()),
            };
            Ok(ArrowType::Timestamp { unit, timezone })
        }
        Some(b'D') => match unit.and_then(TimeUnit::from_format_char) {
            Some(unit) if exact => Ok(ArrowType::Duration(unit)),
            _ => Err(ColumnarError::new(format!(
                "Invalid duration format string: '{format}'"
            ))),
        },
        Some(b'i') => match unit {
            Some(b'M') if exact => Ok(ArrowType::Interval(IntervalUnit::YearMonth)),
            Some(b'D') if exact => Ok(ArrowType::Interval(IntervalUnit::DayTime)),
            Some(b'n') if exact => Ok(ArrowType::Interval(IntervalUnit::MonthDayNano)),
            _ => Err(ColumnarError::new(format!(
                "Invalid interval format string: '{format}'"
            ))),
        },
        _ => Err(ColumnarError::new(format!(
            "Invalid time format string: '{format}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use columnar_error::ErrorKind;
    use smallvec::smallvec;

    use super::*;
    use crate::datatype::LayoutCategory;

    fn parse_err(format: &str) -> ColumnarError {
        parse_format(format).unwrap_err()
    }

    #[test]
    fn empty_format() {
        let err = parse_err("");
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn fixed_size_binary() {
        let layout = parse_format("w:16").unwrap();
        assert_eq!(ArrowType::FixedSizeBinary { width: 16 }, layout.datatype);
        assert_eq!(16, layout.element_size_bytes);
        assert_eq!(1, layout.n_buffers);
        assert_eq!(Some(0), layout.data_buffer);
        assert_eq!(None, layout.validity_buffer);
    }

    #[test]
    fn fixed_size_binary_malformed() {
        for format in [
            "w",
            "w:",
            "w:abc",
            "w:16x",
            "w:-4",
            "w:0",
            "w16",
            "w:2147483648",
            "w:9223372036854775809",
        ] {
            let err = parse_err(format);
            assert_eq!(ErrorKind::InvalidArgument, err.kind(), "{format}");
            assert!(err.get_msg().contains("w:<width>"), "{format}");
        }
    }

    #[test]
    fn fixed_size_limits() {
        let layout = parse_format("w:2147483647").unwrap();
        assert_eq!(i32::MAX as usize, layout.element_size_bytes);
        assert_eq!(
            ArrowType::FixedSizeList {
                size: i32::MAX as usize
            },
            parse_arrow_type("+w:2147483647").unwrap()
        );

        let err = parse_err("+w:2147483648");
        assert!(err.get_msg().contains("+w:<size>"));
    }

    #[test]
    fn unions() {
        let layout = parse_format("+ud").unwrap();
        assert_eq!(ArrowType::DenseUnion { type_ids: None }, layout.datatype);
        assert_eq!(3, layout.n_buffers);
        assert_eq!(Some(1), layout.union_type_buffer);
        assert_eq!(Some(2), layout.offset_buffer);
        assert_eq!(None, layout.validity_buffer);

        let layout = parse_format("+us").unwrap();
        assert_eq!(LayoutCategory::SparseUnion, layout.category);
        assert_eq!(2, layout.n_buffers);
        assert_eq!(Some(1), layout.union_type_buffer);
        assert_eq!(None, layout.offset_buffer);
    }

    #[test]
    fn union_type_ids() {
        let datatype = parse_arrow_type("+us:4,1").unwrap();
        assert_eq!(
            ArrowType::SparseUnion {
                type_ids: Some(smallvec![4, 1])
            },
            datatype
        );

        let datatype = parse_arrow_type("+ud:").unwrap();
        assert_eq!(
            ArrowType::DenseUnion {
                type_ids: Some(UnionTypeIds::new())
            },
            datatype
        );

        assert!(parse_arrow_type("+ud:1,1").is_err());
        assert!(parse_arrow_type("+ud:1,x").is_err());
        assert!(parse_arrow_type("+ud:200").is_err());
        assert!(parse_arrow_type("+ud0,1").is_err());
    }

    #[test]
    fn invalid_union_mode() {
        for format in ["+ux", "+u"] {
            let err = parse_err(format);
            assert_eq!(ErrorKind::InvalidArgument, err.kind());
            assert_eq!(format!("Invalid union format string: '{format}'"), err.get_msg());
        }
    }

    #[test]
    fn unknown_formats_echo_input() {
        for format in ["bogus", "+z", "x", "+lx", "ii"] {
            let err = parse_err(format);
            assert_eq!(ErrorKind::InvalidArgument, err.kind());
            assert_eq!(format!("Unknown format string: '{format}'"), err.get_msg());
        }
    }

    #[test]
    fn nested() {
        assert_eq!(ArrowType::List, parse_arrow_type("+l").unwrap());
        assert_eq!(ArrowType::LargeList, parse_arrow_type("+L").unwrap());
        assert_eq!(ArrowType::Struct, parse_arrow_type("+s").unwrap());
        assert_eq!(ArrowType::Map, parse_arrow_type("+m").unwrap());
        assert_eq!(
            ArrowType::FixedSizeList { size: 1 },
            parse_arrow_type("+w").unwrap()
        );
        assert_eq!(
            ArrowType::FixedSizeList { size: 4 },
            parse_arrow_type("+w:4").unwrap()
        );
        assert!(parse_arrow_type("+w:").is_err());

        let layout = parse_format("+s").unwrap();
        assert_eq!(1, layout.n_buffers);
        assert_eq!(Some(0), layout.validity_buffer);
    }

    #[test]
    fn temporal() {
        assert_eq!(ArrowType::Date32, parse_arrow_type("tdD").unwrap());
        assert_eq!(ArrowType::Date64, parse_arrow_type("tdm").unwrap());
        assert_eq!(
            ArrowType::Time32(TimeUnit::Millisecond),
            parse_arrow_type("ttm").unwrap()
        );
        assert_eq!(
            ArrowType::Time64(TimeUnit::Nanosecond),
            parse_arrow_type("ttn").unwrap()
        );
        assert_eq!(
            ArrowType::Timestamp {
                unit: TimeUnit::Second,
                timezone: None
            },
            parse_arrow_type("tss:").unwrap()
        );
        assert_eq!(
            ArrowType::Timestamp {
                unit: TimeUnit::Nanosecond,
                timezone: Some("Europe/Paris".to_string())
            },
            parse_arrow_type("tsn:Europe/Paris").unwrap()
        );
        assert_eq!(
            ArrowType::Duration(TimeUnit::Microsecond),
            parse_arrow_type("tDu").unwrap()
        );

        let layout = parse_format("tin").unwrap();
        assert_eq!(16, layout.element_size_bytes);
        assert_eq!(2, layout.n_buffers);
    }

    #[test]
    fn temporal_invalid_units() {
        let cases = [
            ("tdx", "Invalid date format string"),
            ("td", "Invalid date format string"),
            ("ttx", "Invalid time of day format string"),
            ("tsx", "Invalid timestamp format string"),
            ("tssUTC", "Invalid timestamp format string"),
            ("tss", "Invalid timestamp format string"),
            ("tDx", "Invalid duration format string"),
            ("tix", "Invalid interval format string"),
            ("tx", "Invalid time format string"),
            ("t", "Invalid time format string"),
        ];

        for (format, msg) in cases {
            let err = parse_err(format);
            assert_eq!(ErrorKind::InvalidArgument, err.kind(), "{format}");
            assert_eq!(format!("{msg}: '{format}'"), err.get_msg());
        }
    }

    #[test]
    fn decimal() {
        let layout = parse_format("d:10,2").unwrap();
        assert_eq!(
            ArrowType::Decimal {
                precision: 10,
                scale: 2,
                bit_width: 128
            },
            layout.datatype
        );
        assert_eq!(16, layout.element_size_bytes);

        let layout = parse_format("d:9,-3,32").unwrap();
        assert_eq!(4, layout.element_size_bytes);

        let datatype = parse_arrow_type("d:5,-128").unwrap();
        assert_eq!(
            ArrowType::Decimal {
                precision: 5,
                scale: -128,
                bit_width: 128
            },
            datatype
        );
        assert_eq!("d:5,-128", datatype.format_string());

        for format in [
            "d",
            "d:",
            "d:10",
            "d:0,1",
            "d:10,2,48",
            "d:10,2,128,1",
            "d:5,-129",
            "d:5,+1",
            "d:5,--1",
        ] {
            let err = parse_err(format);
            assert!(err.get_msg().contains("d:<precision>,<scale>"), "{format}");
        }
    }

    #[test]
    fn not_implemented_formats() {
        for format in ["vu", "vz", "+vl", "+vL", "+r"] {
            let err = parse_err(format);
            assert_eq!(ErrorKind::NotImplemented, err.kind(), "{format}");
        }
    }

    #[test]
    fn from_str_matches_display() {
        for format in ["i", "w:3", "+w:2", "+ud:0,5", "tsm:UTC", "d:38,10", "d:5,1,64"] {
            let datatype: ArrowType = format.parse().unwrap();
            assert_eq!(format, datatype.to_string());
        }
    }
}
