//! Utilities useful for testing.
//!
//! Note these aren't placed behind an `cfg[(test)]` annotation since they
//! should be usable outside of the crate. Builders panic on invalid input.

use crate::array::ArrayData;
use crate::bitmap::Bitmap;
use crate::buffer::{Buffer, NativeType, OffsetIndex};
use crate::format::parse_format;
use crate::scalar::ScalarValue;

fn validity_for<T>(values: &[Option<T>]) -> Option<Buffer> {
    if values.iter().all(|v| v.is_some()) {
        return None;
    }
    Some(Bitmap::from_iter(values.iter().map(|v| v.is_some())).into())
}

/// Create a primitive array for the given format string.
///
/// Nulls are stored as zeroed values. A validity buffer is only created if
/// there are nulls.
pub fn primitive_array<T: NativeType>(format: &str, values: &[Option<T>]) -> ArrayData {
    let layout = parse_format(format).unwrap();
    let data: Vec<T> = values.iter().map(|v| v.unwrap_or_default()).collect();

    ArrayData::try_new(
        layout,
        values.len(),
        vec![validity_for(values), Some(Buffer::from_values(&data))],
        vec![],
    )
    .unwrap()
}

pub fn int32_array(values: &[Option<i32>]) -> ArrayData {
    primitive_array("i", values)
}

pub fn int64_array(values: &[Option<i64>]) -> ArrayData {
    primitive_array("l", values)
}

pub fn boolean_array(values: &[Option<bool>]) -> ArrayData {
    let layout = parse_format("b").unwrap();
    let data = Bitmap::from_iter(values.iter().map(|v| v.unwrap_or(false)));

    ArrayData::try_new(
        layout,
        values.len(),
        vec![validity_for(values), Some(data.into())],
        vec![],
    )
    .unwrap()
}

fn varlen_array<O: OffsetIndex>(format: &str, values: &[Option<&[u8]>]) -> ArrayData {
    let layout = parse_format(format).unwrap();

    let mut offsets = vec![O::ZERO];
    let mut data = Vec::new();
    for value in values {
        data.extend_from_slice(value.unwrap_or_default());
        offsets.push(O::try_from_i64(data.len() as i64).unwrap());
    }

    ArrayData::try_new(
        layout,
        values.len(),
        vec![
            validity_for(values),
            Some(Buffer::from_values(&offsets)),
            Some(data.into()),
        ],
        vec![],
    )
    .unwrap()
}

pub fn utf8_array(values: &[Option<&str>]) -> ArrayData {
    let bytes: Vec<_> = values.iter().map(|v| v.map(str::as_bytes)).collect();
    varlen_array::<i32>("u", &bytes)
}

pub fn large_utf8_array(values: &[Option<&str>]) -> ArrayData {
    let bytes: Vec<_> = values.iter().map(|v| v.map(str::as_bytes)).collect();
    varlen_array::<i64>("U", &bytes)
}

pub fn binary_array(values: &[Option<&[u8]>]) -> ArrayData {
    varlen_array::<i32>("z", values)
}

fn offset_list_array<O: OffsetIndex>(
    format: &str,
    child: ArrayData,
    offsets: &[O],
    validity: &[bool],
) -> ArrayData {
    let layout = parse_format(format).unwrap();
    assert_eq!(offsets.len(), validity.len() + 1);

    ArrayData::try_new(
        layout,
        validity.len(),
        vec![
            Some(Bitmap::from_iter(validity.iter().copied()).into()),
            Some(Buffer::from_values(offsets)),
        ],
        vec![child],
    )
    .unwrap()
}

/// Create a list array over `child` using the given offsets.
///
/// `validity` has one entry per list.
pub fn list_array(child: ArrayData, offsets: &[i32], validity: &[bool]) -> ArrayData {
    offset_list_array("+l", child, offsets, validity)
}

/// Same as [`list_array`] but with 64-bit offsets.
pub fn large_list_array(child: ArrayData, offsets: &[i64], validity: &[bool]) -> ArrayData {
    offset_list_array("+L", child, offsets, validity)
}

/// Create a map array with no validity buffer, one map per entry.
///
/// `entries` should be a struct array of keys and values.
pub fn map_array(entries: ArrayData) -> ArrayData {
    let layout = parse_format("+m").unwrap();
    ArrayData::try_new(layout, entries.len(), vec![None], vec![entries]).unwrap()
}

/// Create a struct array with no validity buffer.
pub fn struct_array(children: Vec<ArrayData>) -> ArrayData {
    let layout = parse_format("+s").unwrap();
    let len = children.first().map(|c| c.len()).unwrap_or(0);
    ArrayData::try_new(layout, len, vec![None], children).unwrap()
}

/// Create a fixed size list array with no validity buffer.
pub fn fixed_size_list_array(child: ArrayData, size: usize) -> ArrayData {
    let layout = parse_format(&format!("+w:{size}")).unwrap();
    let len = child.len() / size;
    ArrayData::try_new(layout, len, vec![None], vec![child]).unwrap()
}

/// Create a sparse union array, `format` should be some `+us` format.
pub fn sparse_union_array(format: &str, type_ids: &[i8], children: Vec<ArrayData>) -> ArrayData {
    let layout = parse_format(format).unwrap();
    ArrayData::try_new(
        layout,
        type_ids.len(),
        vec![None, Some(Buffer::from_values(type_ids))],
        children,
    )
    .unwrap()
}

/// Create a dense union array, `format` should be some `+ud` format.
pub fn dense_union_array(
    format: &str,
    type_ids: &[i8],
    offsets: &[i32],
    children: Vec<ArrayData>,
) -> ArrayData {
    let layout = parse_format(format).unwrap();
    assert_eq!(type_ids.len(), offsets.len());
    ArrayData::try_new(
        layout,
        type_ids.len(),
        vec![
            None,
            Some(Buffer::from_values(type_ids)),
            Some(Buffer::from_values(offsets)),
        ],
        children,
    )
    .unwrap()
}

/// Create a zeroed, all null array with the same layout as `array`.
///
/// Only usable for layouts without children.
pub fn zeroed_like(array: &ArrayData, len: usize, data_capacity: usize) -> ArrayData {
    ArrayData::new_zeroed(array.layout().clone(), len, true, data_capacity, vec![]).unwrap()
}

/// Read all values from an array.
pub fn values_of(array: &ArrayData) -> Vec<ScalarValue<'_>> {
    (0..array.len())
        .map(|idx| array.scalar(idx).unwrap())
        .collect()
}

/// Asserts that two arrays are logically equal.
///
/// This compares types and the scalar values at every index, buffer bytes
/// not referenced by any value are ignored.
pub fn assert_arrays_eq(a: &ArrayData, b: &ArrayData) {
    assert_eq!(a.datatype(), b.datatype(), "Array types differ");

    if a.len() != b.len() {
        panic!("Array lengths differ, got {} and {}", a.len(), b.len());
    }

    for idx in 0..a.len() {
        let a_scalar = a.scalar(idx).unwrap();
        let b_scalar = b.scalar(idx).unwrap();

        assert_eq!(a_scalar, b_scalar, "Scalars differ at index {idx}");
    }
}
