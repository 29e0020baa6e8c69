use std::borrow::Cow;

use columnar_error::{ColumnarError, OptionExt, Result};

use crate::bitmap::{get_bit, num_bytes_for_bits};
use crate::buffer::{read_value, Buffer, NativeType};
use crate::datatype::{ArrowType, DataKind, IntervalUnit, LayoutCategory};
use crate::layout::{BufferRole, Layout};
use crate::scalar::ScalarValue;

/// A realized array.
///
/// Holds one optional buffer per buffer slot declared by the layout, and an
/// ordered list of owned children. A missing validity buffer means every
/// value is valid. All other declared buffers must be present (the reserved
/// union slot excepted).
///
/// Buffers are sized up front, copies write into existing bytes only.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    layout: Layout,
    len: usize,
    buffers: Vec<Option<Buffer>>,
    children: Vec<ArrayData>,
}

impl ArrayData {
    /// Create a new array, validating buffers and children against the
    /// layout.
    pub fn try_new(
        layout: Layout,
        len: usize,
        buffers: Vec<Option<Buffer>>,
        children: Vec<ArrayData>,
    ) -> Result<Self> {
        let array = ArrayData {
            layout,
            len,
            buffers,
            children,
        };
        array.validate()?;
        Ok(array)
    }

    /// Create an array with zeroed buffers sized for `len` elements.
    ///
    /// `data_capacity` is the number of bytes to reserve for variable width
    /// data and is ignored for other layouts. Validity is all null if
    /// `nullable`, otherwise omitted.
    pub fn new_zeroed(
        layout: Layout,
        len: usize,
        nullable: bool,
        data_capacity: usize,
        children: Vec<ArrayData>,
    ) -> Result<Self> {
        let n_offsets = offset_count(&layout, len);
        let datatype = &layout.datatype;
        let buffers = layout
            .buffer_roles()
            .map(|(_, role)| {
                let num_bytes = match role {
                    BufferRole::Validity if nullable => num_bytes_for_bits(len),
                    BufferRole::Validity | BufferRole::Reserved => return Ok(None),
                    BufferRole::Offsets => checked_size(n_offsets, i32::WIDTH, datatype)?,
                    BufferRole::LargeOffsets => checked_size(n_offsets, i64::WIDTH, datatype)?,
                    BufferRole::UnionTypes => len,
                    BufferRole::Data => match layout.data_kind() {
                        DataKind::Bits => num_bytes_for_bits(len),
                        DataKind::Fixed => checked_size(len, layout.element_size_bytes, datatype)?,
                        DataKind::Variable => data_capacity,
                        DataKind::None => 0,
                    },
                };
                Ok(Some(Buffer::zeroed(num_bytes)))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::try_new(layout, len, buffers, children)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn datatype(&self) -> &ArrowType {
        &self.layout.datatype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self, idx: usize) -> Option<&Buffer> {
        self.buffers.get(idx)?.as_ref()
    }

    pub fn buffer_mut(&mut self, idx: usize) -> Option<&mut Buffer> {
        self.buffers.get_mut(idx)?.as_mut()
    }

    pub fn children(&self) -> &[ArrayData] {
        &self.children
    }

    pub fn child(&self, idx: usize) -> Option<&ArrayData> {
        self.children.get(idx)
    }

    pub fn child_mut(&mut self, idx: usize) -> Option<&mut ArrayData> {
        self.children.get_mut(idx)
    }

    pub fn validity(&self) -> Option<&Buffer> {
        self.buffer(self.layout.validity_buffer?)
    }

    /// Get the validity at the given index.
    pub fn is_valid(&self, idx: usize) -> Option<bool> {
        if idx >= self.len {
            return None;
        }

        if self.layout.category == LayoutCategory::Null {
            return Some(false);
        }

        Some(
            self.validity()
                .map(|v| get_bit(v.as_slice(), idx))
                .unwrap_or(true),
        )
    }

    /// Read the offset at `idx` from either the 32-bit or 64-bit offset
    /// buffer.
    pub fn offset(&self, idx: usize) -> Option<i64> {
        if let Some(buf) = self.layout.offset_buffer {
            return self.buffer(buf)?.get::<i32>(idx).map(|v| v as i64);
        }
        let buf = self.layout.large_offset_buffer?;
        self.buffer(buf)?.get::<i64>(idx)
    }

    /// Range delimited by offsets `idx` and `idx + 1`.
    pub fn offset_range(&self, idx: usize) -> Option<(usize, usize)> {
        let start = usize::try_from(self.offset(idx)?).ok()?;
        let end = usize::try_from(self.offset(idx + 1)?).ok()?;
        if end < start {
            return None;
        }
        Some((start, end))
    }

    pub fn union_type_id(&self, idx: usize) -> Option<i8> {
        let buf = self.layout.union_type_buffer?;
        self.buffer(buf)?.get::<i8>(idx)
    }

    fn data(&self) -> Option<&[u8]> {
        self.buffer(self.layout.data_buffer?).map(|b| b.as_slice())
    }

    /// Get a scalar value at the given index.
    ///
    /// Returns None if the index is out of bounds or the array's buffers
    /// don't hold the value.
    pub fn scalar(&self, idx: usize) -> Option<ScalarValue<'_>> {
        if !self.is_valid(idx)? {
            return Some(ScalarValue::Null);
        }

        Some(match self.layout.category {
            LayoutCategory::Null => ScalarValue::Null,
            LayoutCategory::Boolean => {
                let data = self.data()?;
                if idx / 8 >= data.len() {
                    return None;
                }
                ScalarValue::Boolean(get_bit(data, idx))
            }
            LayoutCategory::FixedPrimitive => self.primitive_scalar(idx)?,
            LayoutCategory::FixedSizeBinary => {
                let width = self.layout.element_size_bytes;
                let bytes = self.data()?.get(idx * width..(idx + 1) * width)?;
                ScalarValue::FixedBytes(Cow::Borrowed(bytes))
            }
            LayoutCategory::Varlen | LayoutCategory::LargeVarlen => {
                let (start, end) = self.offset_range(idx)?;
                let bytes = self.data()?.get(start..end)?;
                match self.datatype() {
                    ArrowType::Utf8 | ArrowType::LargeUtf8 => {
                        ScalarValue::Utf8(Cow::Borrowed(std::str::from_utf8(bytes).ok()?))
                    }
                    _ => ScalarValue::Binary(Cow::Borrowed(bytes)),
                }
            }
            LayoutCategory::List | LayoutCategory::LargeList => {
                let (start, end) = self.offset_range(idx)?;
                let child = self.child(0)?;
                let vals = (start..end)
                    .map(|child_idx| child.scalar(child_idx))
                    .collect::<Option<Vec<_>>>()?;
                ScalarValue::List(vals)
            }
            LayoutCategory::Container => match self.datatype() {
                ArrowType::FixedSizeList { size } => {
                    let child = self.child(0)?;
                    let vals = (idx * size..(idx + 1) * size)
                        .map(|child_idx| child.scalar(child_idx))
                        .collect::<Option<Vec<_>>>()?;
                    ScalarValue::List(vals)
                }
                _ => {
                    let vals = self
                        .children
                        .iter()
                        .map(|child| child.scalar(idx))
                        .collect::<Option<Vec<_>>>()?;
                    ScalarValue::Struct(vals)
                }
            },
            LayoutCategory::SparseUnion => {
                let type_id = self.union_type_id(idx)?;
                let child = self.child(self.datatype().union_child_index(type_id)?)?;
                ScalarValue::Union {
                    type_id,
                    value: Box::new(child.scalar(idx)?),
                }
            }
            LayoutCategory::DenseUnion => {
                let type_id = self.union_type_id(idx)?;
                let child = self.child(self.datatype().union_child_index(type_id)?)?;
                let child_idx = usize::try_from(self.offset(idx)?).ok()?;
                ScalarValue::Union {
                    type_id,
                    value: Box::new(child.scalar(child_idx)?),
                }
            }
        })
    }

    fn primitive_scalar(&self, idx: usize) -> Option<ScalarValue<'_>> {
        let data = self.data()?;
        Some(match self.datatype() {
            ArrowType::Int8 => ScalarValue::Int8(read_value(data, idx)?),
            ArrowType::Int16 => ScalarValue::Int16(read_value(data, idx)?),
            ArrowType::Int32 => ScalarValue::Int32(read_value(data, idx)?),
            ArrowType::Int64 => ScalarValue::Int64(read_value(data, idx)?),
            ArrowType::UInt8 => ScalarValue::UInt8(read_value(data, idx)?),
            ArrowType::UInt16 => ScalarValue::UInt16(read_value(data, idx)?),
            ArrowType::UInt32 => ScalarValue::UInt32(read_value(data, idx)?),
            ArrowType::UInt64 => ScalarValue::UInt64(read_value(data, idx)?),
            ArrowType::Float16 => ScalarValue::Float16(read_value(data, idx)?),
            ArrowType::Float32 => ScalarValue::Float32(read_value(data, idx)?),
            ArrowType::Float64 => ScalarValue::Float64(read_value(data, idx)?),
            ArrowType::Date32
            | ArrowType::Time32(_)
            | ArrowType::Interval(IntervalUnit::YearMonth) => {
                ScalarValue::Int32(read_value(data, idx)?)
            }
            ArrowType::Date64
            | ArrowType::Time64(_)
            | ArrowType::Timestamp { .. }
            | ArrowType::Duration(_) => ScalarValue::Int64(read_value(data, idx)?),
            ArrowType::Decimal { bit_width: 32, .. } => ScalarValue::Int32(read_value(data, idx)?),
            ArrowType::Decimal { bit_width: 64, .. } => ScalarValue::Int64(read_value(data, idx)?),
            _ => {
                let width = self.layout.element_size_bytes;
                let bytes = data.get(idx * width..(idx + 1) * width)?;
                ScalarValue::FixedBytes(Cow::Borrowed(bytes))
            }
        })
    }

    fn validate(&self) -> Result<()> {
        let layout = &self.layout;
        layout.validate()?;

        if self.buffers.len() != layout.n_buffers {
            return Err(ColumnarError::new(format!(
                "Expected {} buffers for '{}', got {}",
                layout.n_buffers,
                layout.datatype,
                self.buffers.len()
            )));
        }

        for (idx, role) in layout.buffer_roles() {
            let buffer = match role {
                BufferRole::Reserved => continue,
                BufferRole::Validity => match self.buffer(idx) {
                    Some(buffer) => buffer,
                    None => continue,
                },
                _ => self.buffer(idx).required("buffer for declared role")?,
            };

            let datatype = &layout.datatype;
            let required = match role {
                BufferRole::Validity => num_bytes_for_bits(self.len),
                BufferRole::Offsets => {
                    checked_size(offset_count(layout, self.len), i32::WIDTH, datatype)?
                }
                BufferRole::LargeOffsets => {
                    checked_size(offset_count(layout, self.len), i64::WIDTH, datatype)?
                }
                BufferRole::UnionTypes => self.len,
                BufferRole::Data => match layout.data_kind() {
                    DataKind::Bits => num_bytes_for_bits(self.len),
                    DataKind::Fixed => checked_size(self.len, layout.element_size_bytes, datatype)?,
                    // Checked against offsets below.
                    DataKind::Variable | DataKind::None => 0,
                },
                BufferRole::Reserved => 0,
            };

            if buffer.len() < required {
                return Err(ColumnarError::new(format!(
                    "{role:?} buffer {idx} for '{}' has {} bytes, need at least {required} \
                     for {} elements",
                    layout.datatype,
                    buffer.len(),
                    self.len
                )));
            }
        }

        if matches!(
            layout.category,
            LayoutCategory::Varlen
                | LayoutCategory::LargeVarlen
                | LayoutCategory::List
                | LayoutCategory::LargeList
        ) {
            let mut prev = 0;
            for idx in 0..=self.len {
                let offset = self.offset(idx).required("offset within offset buffer")?;
                if offset < prev {
                    return Err(ColumnarError::new(format!(
                        "Offset {offset} at index {idx} for '{}' is below {prev}",
                        layout.datatype
                    )));
                }
                prev = offset;
            }
        }

        let last_offset = match self.offset(self.len).filter(|_| has_end_offset(layout)) {
            Some(offset) => Some(usize::try_from(offset).map_err(|_| {
                ColumnarError::new(format!(
                    "Negative final offset {offset} for '{}'",
                    layout.datatype
                ))
            })?),
            None => None,
        };

        if layout.data_kind() == DataKind::Variable {
            let data_len = self.data().map(|d| d.len()).unwrap_or(0);
            let last_offset = last_offset.unwrap_or(0);
            if data_len < last_offset {
                return Err(ColumnarError::new(format!(
                    "Data buffer for '{}' has {data_len} bytes, offsets reference {last_offset}",
                    layout.datatype
                )));
            }
        }

        if let Some(expected) = layout.datatype.expected_children() {
            if self.children.len() != expected {
                return Err(ColumnarError::new(format!(
                    "Expected {expected} children for '{}', got {}",
                    layout.datatype,
                    self.children.len()
                )));
            }
        }

        let min_child_len = match &layout.datatype {
            ArrowType::List | ArrowType::LargeList => last_offset.unwrap_or(0),
            ArrowType::FixedSizeList { size } => checked_size(self.len, *size, &layout.datatype)?,
            ArrowType::Struct | ArrowType::Map | ArrowType::SparseUnion { .. } => self.len,
            _ => 0,
        };

        for (idx, child) in self.children.iter().enumerate() {
            if child.len() < min_child_len {
                return Err(ColumnarError::new(format!(
                    "Child {idx} of '{}' has length {}, need at least {min_child_len}",
                    layout.datatype,
                    child.len()
                )));
            }
        }

        Ok(())
    }
}

/// Number of entries in the offset buffer of an array of `len` elements.
///
/// Dense unions store one offset per slot, everything else stores an
/// additional end offset.
pub(crate) fn offset_count(layout: &Layout, len: usize) -> usize {
    if has_end_offset(layout) {
        len.saturating_add(1)
    } else {
        len
    }
}

/// Multiply an element count by a per-element size, erroring on overflow.
pub(crate) fn checked_size(count: usize, size: usize, datatype: &ArrowType) -> Result<usize> {
    count.checked_mul(size).ok_or_else(|| {
        ColumnarError::new(format!(
            "Size of {count} elements of {size} bytes overflows for '{datatype}'"
        ))
    })
}

fn has_end_offset(layout: &Layout) -> bool {
    layout.category != LayoutCategory::DenseUnion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::format::parse_format;

    #[test]
    fn zeroed_string_array() {
        let arr = ArrayData::new_zeroed(parse_format("u").unwrap(), 4, true, 16, vec![]).unwrap();

        assert_eq!(4, arr.len());
        assert_eq!(1, arr.buffer(0).unwrap().len());
        assert_eq!(20, arr.buffer(1).unwrap().len());
        assert_eq!(16, arr.buffer(2).unwrap().len());
        assert_eq!(Some(false), arr.is_valid(0));
        assert_eq!(Some(ScalarValue::Null), arr.scalar(3));
        assert_eq!(None, arr.scalar(4));
    }

    #[test]
    fn zeroed_union_leaves_reserved_slot_empty() {
        let child = ArrayData::new_zeroed(parse_format("i").unwrap(), 2, false, 0, vec![]).unwrap();
        let layout = parse_format("+ud:3").unwrap();
        let arr = ArrayData::new_zeroed(layout, 2, false, 0, vec![child]).unwrap();

        assert!(arr.buffer(0).is_none());
        assert_eq!(2, arr.buffer(1).unwrap().len());
        assert_eq!(8, arr.buffer(2).unwrap().len());
    }

    #[test]
    fn wrong_buffer_count() {
        let err = ArrayData::try_new(
            parse_format("i").unwrap(),
            1,
            vec![Some(Buffer::from_values(&[1i32]))],
            vec![],
        )
        .unwrap_err();
        assert!(err.get_msg().contains("Expected 2 buffers"));
    }

    #[test]
    fn missing_data_buffer() {
        let layout = parse_format("i").unwrap();
        let err = ArrayData::try_new(layout, 1, vec![None, None], vec![]).unwrap_err();
        assert_eq!(columnar_error::ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn data_buffer_too_small() {
        let err = ArrayData::try_new(
            parse_format("l").unwrap(),
            2,
            vec![None, Some(Buffer::from_values(&[1i64]))],
            vec![],
        )
        .unwrap_err();
        assert!(err.get_msg().contains("need at least 16"));
    }

    #[test]
    fn offsets_past_data() {
        let err = ArrayData::try_new(
            parse_format("z").unwrap(),
            1,
            vec![None, Some(Buffer::from_values(&[0i32, 5])), Some(Buffer::zeroed(4))],
            vec![],
        )
        .unwrap_err();
        assert!(err.get_msg().contains("offsets reference 5"));
    }

    #[test]
    fn decreasing_offsets() {
        let err = ArrayData::try_new(
            parse_format("U").unwrap(),
            2,
            vec![
                None,
                Some(Buffer::from_values(&[0i64, i64::MAX, 0])),
                Some(Buffer::zeroed(4)),
            ],
            vec![],
        )
        .unwrap_err();
        assert!(err.get_msg().contains("at index 2"), "{err}");

        let err = ArrayData::try_new(
            parse_format("u").unwrap(),
            1,
            vec![None, Some(Buffer::from_values(&[-1i32, 0])), Some(Buffer::zeroed(4))],
            vec![],
        )
        .unwrap_err();
        assert!(err.get_msg().contains("Offset -1 at index 0"), "{err}");
    }

    #[test]
    fn fixed_width_size_overflow() {
        let layout = Layout::new(ArrowType::FixedSizeBinary {
            width: usize::MAX / 2 + 2,
        });
        let err = ArrayData::try_new(layout.clone(), 2, vec![Some(Buffer::zeroed(2))], vec![])
            .unwrap_err();
        assert!(err.get_msg().contains("overflows"), "{err}");

        let err = ArrayData::new_zeroed(layout, 2, false, 0, vec![]).unwrap_err();
        assert!(err.get_msg().contains("overflows"), "{err}");
    }

    #[test]
    fn fixed_size_list_child_overflow() {
        let child = ArrayData::new_zeroed(parse_format("c").unwrap(), 1, false, 0, vec![]).unwrap();
        let layout = Layout::new(ArrowType::FixedSizeList {
            size: usize::MAX / 2 + 2,
        });
        let err = ArrayData::try_new(layout, 2, vec![None], vec![child]).unwrap_err();
        assert!(err.get_msg().contains("overflows"), "{err}");
    }

    #[test]
    fn list_requires_child() {
        let layout = parse_format("+l").unwrap();
        let err = ArrayData::new_zeroed(layout, 1, false, 0, vec![]).unwrap_err();
        assert!(err.get_msg().contains("Expected 1 children"));
    }

    #[test]
    fn scalar_primitive_with_nulls() {
        let validity = Bitmap::from_iter([true, false, true]);
        let arr = ArrayData::try_new(
            parse_format("i").unwrap(),
            3,
            vec![Some(validity.into()), Some(Buffer::from_values(&[4i32, 5, 6]))],
            vec![],
        )
        .unwrap();

        assert_eq!(Some(ScalarValue::Int32(4)), arr.scalar(0));
        assert_eq!(Some(ScalarValue::Null), arr.scalar(1));
        assert_eq!(Some(ScalarValue::Int32(6)), arr.scalar(2));
    }

    #[test]
    fn scalar_boolean() {
        let arr = ArrayData::try_new(
            parse_format("b").unwrap(),
            3,
            vec![None, Some(Bitmap::from_iter([false, true, true]).into())],
            vec![],
        )
        .unwrap();

        assert_eq!(Some(ScalarValue::Boolean(false)), arr.scalar(0));
        assert_eq!(Some(ScalarValue::Boolean(true)), arr.scalar(2));
    }

    #[test]
    fn scalar_sparse_union() {
        let ints = ArrayData::try_new(
            parse_format("i").unwrap(),
            2,
            vec![None, Some(Buffer::from_values(&[1i32, 2]))],
            vec![],
        )
        .unwrap();
        let bools = ArrayData::try_new(
            parse_format("b").unwrap(),
            2,
            vec![None, Some(Bitmap::from_iter([true, false]).into())],
            vec![],
        )
        .unwrap();

        let arr = ArrayData::try_new(
            parse_format("+us:7,3").unwrap(),
            2,
            vec![None, Some(Buffer::from_values(&[3i8, 7]))],
            vec![ints, bools],
        )
        .unwrap();

        assert_eq!(
            Some(ScalarValue::Union {
                type_id: 3,
                value: Box::new(ScalarValue::Boolean(true))
            }),
            arr.scalar(0)
        );
        assert_eq!(
            Some(ScalarValue::Union {
                type_id: 7,
                value: Box::new(ScalarValue::Int32(2))
            }),
            arr.scalar(1)
        );
    }
}
