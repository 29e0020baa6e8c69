use std::fmt;

use smallvec::SmallVec;

/// Type ids declared by a union format string (`+ud:0,1`).
///
/// The position of an id in this list is the index of the child array it
/// selects.
pub type UnionTypeIds = SmallVec<[i8; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    pub const fn format_char(&self) -> char {
        match self {
            Self::Second => 's',
            Self::Millisecond => 'm',
            Self::Microsecond => 'u',
            Self::Nanosecond => 'n',
        }
    }

    pub const fn from_format_char(c: u8) -> Option<Self> {
        match c {
            b's' => Some(Self::Second),
            b'm' => Some(Self::Millisecond),
            b'u' => Some(Self::Microsecond),
            b'n' => Some(Self::Nanosecond),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntervalUnit {
    /// Number of months (4 bytes).
    YearMonth,
    /// Days and milliseconds (2 x 4 bytes).
    DayTime,
    /// Months, days and nanoseconds (4 + 4 + 8 bytes).
    MonthDayNano,
}

/// Logical types understood by the format decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrowType {
    Null,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
    Decimal {
        precision: u8,
        scale: i8,
        bit_width: u16,
    },
    FixedSizeBinary {
        width: usize,
    },
    Binary,
    Utf8,
    LargeBinary,
    LargeUtf8,
    /// Days since epoch.
    Date32,
    /// Milliseconds since epoch.
    Date64,
    /// Time of day, seconds or milliseconds.
    Time32(TimeUnit),
    /// Time of day, microseconds or nanoseconds.
    Time64(TimeUnit),
    Timestamp {
        unit: TimeUnit,
        timezone: Option<String>,
    },
    Duration(TimeUnit),
    Interval(IntervalUnit),
    List,
    LargeList,
    /// A list where every value has exactly `size` child elements.
    FixedSizeList {
        size: usize,
    },
    Struct,
    Map,
    DenseUnion {
        type_ids: Option<UnionTypeIds>,
    },
    SparseUnion {
        type_ids: Option<UnionTypeIds>,
    },
}

/// How the payload of an array is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataKind {
    /// No payload buffer (null, containers, unions).
    None,
    /// One bit per element.
    Bits,
    /// Fixed number of bytes per element.
    Fixed,
    /// Variable number of bytes per element, delimited by offsets.
    Variable,
}

/// Groups of types sharing the same physical buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutCategory {
    Null,
    Boolean,
    FixedPrimitive,
    FixedSizeBinary,
    Varlen,
    LargeVarlen,
    List,
    LargeList,
    /// Fixed size lists, structs and maps. Children are parallel to the
    /// parent.
    Container,
    DenseUnion,
    SparseUnion,
}

/// Buffer role assignments for a layout category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRoles {
    pub n_buffers: usize,
    pub validity: Option<usize>,
    pub offsets: Option<usize>,
    pub large_offsets: Option<usize>,
    pub union_types: Option<usize>,
    pub data: Option<usize>,
    pub data_kind: DataKind,
}

const fn roles(
    n_buffers: usize,
    validity: Option<usize>,
    offsets: Option<usize>,
    large_offsets: Option<usize>,
    union_types: Option<usize>,
    data: Option<usize>,
    data_kind: DataKind,
) -> BufferRoles {
    BufferRoles {
        n_buffers,
        validity,
        offsets,
        large_offsets,
        union_types,
        data,
        data_kind,
    }
}

/// Role table, indexed by `LayoutCategory`.
///
/// Unions keep buffer 0 as a reserved slot. It's never read or written.
static ROLE_TABLE: [BufferRoles; 11] = [
    // Null
    roles(0, None, None, None, None, None, DataKind::None),
    // Boolean
    roles(2, Some(0), None, None, None, Some(1), DataKind::Bits),
    // FixedPrimitive
    roles(2, Some(0), None, None, None, Some(1), DataKind::Fixed),
    // FixedSizeBinary
    roles(1, None, None, None, None, Some(0), DataKind::Fixed),
    // Varlen
    roles(3, Some(0), Some(1), None, None, Some(2), DataKind::Variable),
    // LargeVarlen
    roles(3, Some(0), None, Some(1), None, Some(2), DataKind::Variable),
    // List
    roles(2, Some(0), Some(1), None, None, None, DataKind::None),
    // LargeList
    roles(2, Some(0), None, Some(1), None, None, DataKind::None),
    // Container
    roles(1, Some(0), None, None, None, None, DataKind::None),
    // DenseUnion
    roles(3, None, Some(2), None, Some(1), None, DataKind::None),
    // SparseUnion
    roles(2, None, None, None, Some(1), None, DataKind::None),
];

impl LayoutCategory {
    pub fn roles(&self) -> &'static BufferRoles {
        &ROLE_TABLE[*self as usize]
    }

    /// If arrays of this category hold child arrays.
    pub const fn is_nested(&self) -> bool {
        matches!(
            self,
            Self::List | Self::LargeList | Self::Container | Self::DenseUnion | Self::SparseUnion
        )
    }
}

impl ArrowType {
    pub const fn category(&self) -> LayoutCategory {
        match self {
            Self::Null => LayoutCategory::Null,
            Self::Boolean => LayoutCategory::Boolean,
            Self::Int8
            | Self::UInt8
            | Self::Int16
            | Self::UInt16
            | Self::Int32
            | Self::UInt32
            | Self::Int64
            | Self::UInt64
            | Self::Float16
            | Self::Float32
            | Self::Float64
            | Self::Decimal { .. }
            | Self::Date32
            | Self::Date64
            | Self::Time32(_)
            | Self::Time64(_)
            | Self::Timestamp { .. }
            | Self::Duration(_)
            | Self::Interval(_) => LayoutCategory::FixedPrimitive,
            Self::FixedSizeBinary { .. } => LayoutCategory::FixedSizeBinary,
            Self::Binary | Self::Utf8 => LayoutCategory::Varlen,
            Self::LargeBinary | Self::LargeUtf8 => LayoutCategory::LargeVarlen,
            Self::List => LayoutCategory::List,
            Self::LargeList => LayoutCategory::LargeList,
            Self::FixedSizeList { .. } | Self::Struct | Self::Map => LayoutCategory::Container,
            Self::DenseUnion { .. } => LayoutCategory::DenseUnion,
            Self::SparseUnion { .. } => LayoutCategory::SparseUnion,
        }
    }

    /// Width in bytes of a single fixed-width element.
    ///
    /// Returns None for types without fixed-width elements, including
    /// booleans which are bit-packed.
    pub fn element_width(&self) -> Option<usize> {
        Some(match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Date32 | Self::Time32(_) => 4,
            Self::Int64
            | Self::UInt64
            | Self::Float64
            | Self::Date64
            | Self::Time64(_)
            | Self::Timestamp { .. }
            | Self::Duration(_) => 8,
            Self::Interval(IntervalUnit::YearMonth) => 4,
            Self::Interval(IntervalUnit::DayTime) => 8,
            Self::Interval(IntervalUnit::MonthDayNano) => 16,
            Self::Decimal { bit_width, .. } => (*bit_width / 8) as usize,
            Self::FixedSizeBinary { width } => *width,
            _ => return None,
        })
    }

    /// Map a union type id to the index of the child it selects.
    ///
    /// Without explicit type ids, the type id is the child index.
    pub fn union_child_index(&self, type_id: i8) -> Option<usize> {
        match self {
            Self::DenseUnion { type_ids } | Self::SparseUnion { type_ids } => match type_ids {
                Some(ids) => ids.iter().position(|id| *id == type_id),
                None if type_id >= 0 => Some(type_id as usize),
                None => None,
            },
            _ => None,
        }
    }

    /// Number of children an array of this type must have, if fixed.
    pub fn expected_children(&self) -> Option<usize> {
        match self {
            Self::List | Self::LargeList | Self::FixedSizeList { .. } | Self::Map => Some(1),
            Self::DenseUnion { type_ids } | Self::SparseUnion { type_ids } => {
                type_ids.as_ref().map(|ids| ids.len())
            }
            Self::Struct => None,
            _ => Some(0),
        }
    }

    /// Render the canonical format string for this type.
    pub fn format_string(&self) -> String {
        self.to_string()
    }
}

fn write_type_ids(f: &mut fmt::Formatter<'_>, ids: &Option<UnionTypeIds>) -> fmt::Result {
    if let Some(ids) = ids {
        let ids: Vec<_> = ids.iter().map(|id| id.to_string()).collect();
        write!(f, ":{}", ids.join(","))?;
    }
    Ok(())
}

/// Formats the type as its format string.
impl fmt::Display for ArrowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "n"),
            Self::Boolean => write!(f, "b"),
            Self::Int8 => write!(f, "c"),
            Self::UInt8 => write!(f, "C"),
            Self::Int16 => write!(f, "s"),
            Self::UInt16 => write!(f, "S"),
            Self::Int32 => write!(f, "i"),
            Self::UInt32 => write!(f, "I"),
            Self::Int64 => write!(f, "l"),
            Self::UInt64 => write!(f, "L"),
            Self::Float16 => write!(f, "e"),
            Self::Float32 => write!(f, "f"),
            Self::Float64 => write!(f, "g"),
            Self::Decimal {
                precision,
                scale,
                bit_width,
            } => {
                if *bit_width == 128 {
                    write!(f, "d:{precision},{scale}")
                } else {
                    write!(f, "d:{precision},{scale},{bit_width}")
                }
            }
            Self::FixedSizeBinary { width } => write!(f, "w:{width}"),
            Self::Binary => write!(f, "z"),
            Self::Utf8 => write!(f, "u"),
            Self::LargeBinary => write!(f, "Z"),
            Self::LargeUtf8 => write!(f, "U"),
            Self::Date32 => write!(f, "tdD"),
            Self::Date64 => write!(f, "tdm"),
            Self::Time32(unit) | Self::Time64(unit) => write!(f, "tt{}", unit.format_char()),
            Self::Timestamp { unit, timezone } => {
                write!(f, "ts{}:", unit.format_char())?;
                if let Some(tz) = timezone {
                    write!(f, "{tz}")?;
                }
                Ok(())
            }
            Self::Duration(unit) => write!(f, "tD{}", unit.format_char()),
            Self::Interval(IntervalUnit::YearMonth) => write!(f, "tiM"),
            Self::Interval(IntervalUnit::DayTime) => write!(f, "tiD"),
            Self::Interval(IntervalUnit::MonthDayNano) => write!(f, "tin"),
            Self::List => write!(f, "+l"),
            Self::LargeList => write!(f, "+L"),
            Self::FixedSizeList { size } => write!(f, "+w:{size}"),
            Self::Struct => write!(f, "+s"),
            Self::Map => write!(f, "+m"),
            Self::DenseUnion { type_ids } => {
                write!(f, "+ud")?;
                write_type_ids(f, type_ids)
            }
            Self::SparseUnion { type_ids } => {
                write!(f, "+us")?;
                write_type_ids(f, type_ids)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn role_table_indexes_within_buffer_count() {
        let categories = [
            LayoutCategory::Null,
            LayoutCategory::Boolean,
            LayoutCategory::FixedPrimitive,
            LayoutCategory::FixedSizeBinary,
            LayoutCategory::Varlen,
            LayoutCategory::LargeVarlen,
            LayoutCategory::List,
            LayoutCategory::LargeList,
            LayoutCategory::Container,
            LayoutCategory::DenseUnion,
            LayoutCategory::SparseUnion,
        ];

        for category in categories {
            let roles = category.roles();
            for idx in [
                roles.validity,
                roles.offsets,
                roles.large_offsets,
                roles.union_types,
                roles.data,
            ]
            .into_iter()
            .flatten()
            {
                assert!(idx < roles.n_buffers, "{category:?}");
            }
        }
    }

    #[test]
    fn varlen_roles() {
        let roles = ArrowType::Utf8.category().roles();
        assert_eq!(3, roles.n_buffers);
        assert_eq!(Some(0), roles.validity);
        assert_eq!(Some(1), roles.offsets);
        assert_eq!(None, roles.large_offsets);
        assert_eq!(Some(2), roles.data);
        assert_eq!(DataKind::Variable, roles.data_kind);

        let roles = ArrowType::LargeBinary.category().roles();
        assert_eq!(None, roles.offsets);
        assert_eq!(Some(1), roles.large_offsets);
    }

    #[test]
    fn element_widths() {
        assert_eq!(Some(1), ArrowType::Int8.element_width());
        assert_eq!(Some(2), ArrowType::Float16.element_width());
        assert_eq!(Some(8), ArrowType::UInt64.element_width());
        assert_eq!(
            Some(16),
            ArrowType::Interval(IntervalUnit::MonthDayNano).element_width()
        );
        assert_eq!(
            Some(32),
            ArrowType::Decimal {
                precision: 40,
                scale: 2,
                bit_width: 256
            }
            .element_width()
        );
        assert_eq!(None, ArrowType::Boolean.element_width());
        assert_eq!(None, ArrowType::Utf8.element_width());
    }

    #[test]
    fn union_child_index() {
        let implicit = ArrowType::SparseUnion { type_ids: None };
        assert_eq!(Some(3), implicit.union_child_index(3));
        assert_eq!(None, implicit.union_child_index(-1));

        let explicit = ArrowType::DenseUnion {
            type_ids: Some(smallvec![5, 2]),
        };
        assert_eq!(Some(0), explicit.union_child_index(5));
        assert_eq!(Some(1), explicit.union_child_index(2));
        assert_eq!(None, explicit.union_child_index(0));
    }

    #[test]
    fn display_format_strings() {
        assert_eq!("w:16", ArrowType::FixedSizeBinary { width: 16 }.to_string());
        assert_eq!("+w:3", ArrowType::FixedSizeList { size: 3 }.to_string());
        assert_eq!(
            "tsu:UTC",
            ArrowType::Timestamp {
                unit: TimeUnit::Microsecond,
                timezone: Some("UTC".to_string())
            }
            .to_string()
        );
        assert_eq!(
            "+ud:1,0",
            ArrowType::DenseUnion {
                type_ids: Some(smallvec![1, 0])
            }
            .to_string()
        );
        assert_eq!("+us", ArrowType::SparseUnion { type_ids: None }.to_string());
    }
}
