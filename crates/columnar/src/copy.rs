//! Ranged copies between arrays sharing a layout.
//!
//! Copies write into the destination's existing buffers, nothing is
//! allocated or resized. Offsets are re-based onto the destination, and
//! children are copied recursively over the element range they back.
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Range};

use columnar_error::{ColumnarError, OptionExt, Result};
use tracing::{debug, trace};

use crate::array::{checked_size, ArrayData};
use crate::bitmap::{copy_bits, count_unset, num_bytes_for_bits, set_bits};
use crate::buffer::{read_value, write_value, NativeType, OffsetIndex};
use crate::datatype::{ArrowType, LayoutCategory};
use crate::layout::Layout;

/// Selects which buffer categories a copy touches.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSelector(u32);

impl BufferSelector {
    pub const NONE: Self = BufferSelector(0);
    pub const VALIDITY: Self = BufferSelector(1 << 0);
    /// 32-bit and 64-bit offsets, including dense union offsets.
    pub const OFFSETS: Self = BufferSelector(1 << 1);
    /// Fixed width, bit-packed and variable width payloads.
    pub const DATA: Self = BufferSelector(1 << 2);
    pub const UNION_TYPES: Self = BufferSelector(1 << 3);
    /// Recurse into child arrays.
    pub const CHILDREN: Self = BufferSelector(1 << 4);
    pub const ALL: Self = BufferSelector(0b1_1111);

    /// Create a selector from raw bits, returning None if unknown bits are
    /// set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            return None;
        }
        Some(BufferSelector(bits))
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        BufferSelector(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        BufferSelector(self.0 & !other.0)
    }
}

impl Default for BufferSelector {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for BufferSelector {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for BufferSelector {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs)
    }
}

impl fmt::Debug for BufferSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::VALIDITY, "VALIDITY"),
            (Self::OFFSETS, "OFFSETS"),
            (Self::DATA, "DATA"),
            (Self::UNION_TYPES, "UNION_TYPES"),
            (Self::CHILDREN, "CHILDREN"),
        ];
        let set: Vec<_> = names
            .iter()
            .filter(|(sel, _)| self.contains(*sel))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "BufferSelector({})", set.join(" | "))
    }
}

/// Copy `count` elements starting at `src_offset` in `src` into `dst`
/// starting at `dst_offset`.
///
/// Both arrays must have the same layout. Only the buffer categories in
/// `selector` are written. On error, categories copied before the failing
/// one are complete, the failing one may be partially written.
pub fn copy_range(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    trace!(
        datatype = %src.datatype(),
        %dst_offset,
        %src_offset,
        %count,
        ?selector,
        "copy array range"
    );

    let result = copy_inner(dst, dst_offset, src, src_offset, count, selector);
    if let Err(e) = &result {
        debug!(%e, datatype = %src.datatype(), "array copy failed");
    }

    result
}

fn copy_inner(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    if dst.layout() != src.layout() {
        return Err(ColumnarError::new(format!(
            "Layout mismatch, destination: '{}', source: '{}'",
            dst.datatype(),
            src.datatype()
        )));
    }
    if dst.children().len() != src.children().len() {
        return Err(ColumnarError::new(format!(
            "Child count mismatch for '{}', destination: {}, source: {}",
            src.datatype(),
            dst.children().len(),
            src.children().len()
        )));
    }

    check_range("Source", src_offset, count, src.len())?;
    check_range("Destination", dst_offset, count, dst.len())?;

    if count == 0 {
        return Ok(());
    }

    if selector.contains(BufferSelector::VALIDITY) {
        copy_validity(dst, dst_offset, src, src_offset, count)?;
    }

    match src.layout().category {
        LayoutCategory::Null => Ok(()),
        LayoutCategory::Boolean => {
            if selector.contains(BufferSelector::DATA) {
                copy_bit_data(dst, dst_offset, src, src_offset, count)?;
            }
            Ok(())
        }
        LayoutCategory::FixedPrimitive | LayoutCategory::FixedSizeBinary => {
            if selector.contains(BufferSelector::DATA) {
                copy_fixed_data(dst, dst_offset, src, src_offset, count)?;
            }
            Ok(())
        }
        LayoutCategory::Varlen => {
            copy_varlen::<i32>(dst, dst_offset, src, src_offset, count, selector)
        }
        LayoutCategory::LargeVarlen => {
            copy_varlen::<i64>(dst, dst_offset, src, src_offset, count, selector)
        }
        LayoutCategory::List => copy_list::<i32>(dst, dst_offset, src, src_offset, count, selector),
        LayoutCategory::LargeList => {
            copy_list::<i64>(dst, dst_offset, src, src_offset, count, selector)
        }
        LayoutCategory::Container => {
            copy_container(dst, dst_offset, src, src_offset, count, selector)
        }
        LayoutCategory::SparseUnion => {
            copy_sparse_union(dst, dst_offset, src, src_offset, count, selector)
        }
        LayoutCategory::DenseUnion => {
            copy_dense_union(dst, dst_offset, src, src_offset, count, selector)
        }
    }
}

fn check_range(which: &str, offset: usize, count: usize, len: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(ColumnarError::new(format!(
            "{which} range out of bounds, offset: {offset}, count: {count}, len: {len}"
        ))),
    }
}

fn check_buffer_len(what: &str, datatype: &ArrowType, len: usize, needed: usize) -> Result<()> {
    if len < needed {
        return Err(ColumnarError::new(format!(
            "{what} buffer for '{datatype}' has {len} bytes, copy needs {needed}"
        )));
    }
    Ok(())
}

/// Resolve a role index from the layout, checking it against the buffer
/// count.
fn role_index(layout: &Layout, idx: Option<usize>, what: &str) -> Result<usize> {
    match idx {
        Some(idx) if idx < layout.n_buffers => Ok(idx),
        Some(idx) => Err(ColumnarError::internal(format!(
            "{what} buffer index {idx} out of range for {} buffers in '{}'",
            layout.n_buffers, layout.datatype
        ))),
        None => Err(ColumnarError::internal(format!(
            "Layout for '{}' has no {what} buffer",
            layout.datatype
        ))),
    }
}

fn buffer_ref<'a>(array: &'a ArrayData, idx: usize, what: &str) -> Result<&'a [u8]> {
    match array.buffer(idx) {
        Some(buf) => Ok(buf.as_slice()),
        None => Err(ColumnarError::new(format!(
            "Missing {what} buffer for '{}'",
            array.datatype()
        ))),
    }
}

fn buffer_mut<'a>(array: &'a mut ArrayData, idx: usize, what: &str) -> Result<&'a mut [u8]> {
    if array.buffer(idx).is_none() {
        return Err(ColumnarError::new(format!(
            "Missing {what} buffer for '{}'",
            array.datatype()
        )));
    }
    array
        .buffer_mut(idx)
        .map(|buf| buf.as_mut_slice())
        .required("destination buffer")
}

fn copy_validity(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
) -> Result<()> {
    let layout = src.layout();
    let idx = match layout.validity_buffer {
        Some(_) => role_index(layout, layout.validity_buffer, "validity")?,
        None => return Ok(()),
    };

    let src_validity = src.buffer(idx).map(|b| b.as_slice());
    if let Some(src_validity) = src_validity {
        check_buffer_len(
            "Source validity",
            src.datatype(),
            src_validity.len(),
            num_bytes_for_bits(src_offset + count),
        )?;
    }

    if dst.buffer(idx).is_none() {
        // Destination can't represent nulls.
        if let Some(src_validity) = src_validity {
            let nulls = count_unset(src_validity, src_offset, count);
            if nulls > 0 {
                return Err(ColumnarError::new(format!(
                    "Destination for '{}' has no validity buffer, \
                     but source range contains {nulls} nulls",
                    src.datatype()
                )));
            }
        }
        return Ok(());
    }

    let dst_validity = buffer_mut(dst, idx, "validity")?;
    check_buffer_len(
        "Destination validity",
        &layout.datatype,
        dst_validity.len(),
        num_bytes_for_bits(dst_offset + count),
    )?;

    match src_validity {
        Some(src_validity) => copy_bits(src_validity, src_offset, dst_validity, dst_offset, count),
        None => set_bits(dst_validity, dst_offset, count, true),
    }

    Ok(())
}

fn copy_bit_data(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
) -> Result<()> {
    let layout = src.layout();
    let idx = role_index(layout, layout.data_buffer, "data")?;

    let src_data = buffer_ref(src, idx, "data")?;
    check_buffer_len(
        "Source data",
        &layout.datatype,
        src_data.len(),
        num_bytes_for_bits(src_offset + count),
    )?;

    let dst_data = buffer_mut(dst, idx, "data")?;
    check_buffer_len(
        "Destination data",
        &layout.datatype,
        dst_data.len(),
        num_bytes_for_bits(dst_offset + count),
    )?;

    copy_bits(src_data, src_offset, dst_data, dst_offset, count);

    Ok(())
}

fn copy_fixed_data(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
) -> Result<()> {
    let layout = src.layout();
    let idx = role_index(layout, layout.data_buffer, "data")?;
    let width = layout.element_size_bytes;

    let src_range = byte_range(src_offset, count, width, &layout.datatype)?;
    let dst_range = byte_range(dst_offset, count, width, &layout.datatype)?;

    let src_data = buffer_ref(src, idx, "data")?;
    check_buffer_len("Source data", &layout.datatype, src_data.len(), src_range.end)?;

    let dst_data = buffer_mut(dst, idx, "data")?;
    check_buffer_len("Destination data", &layout.datatype, dst_data.len(), dst_range.end)?;

    dst_data[dst_range].copy_from_slice(&src_data[src_range]);

    Ok(())
}

/// Byte range covering `count` elements of `width` bytes starting at
/// element `offset`.
fn byte_range(
    offset: usize,
    count: usize,
    width: usize,
    datatype: &ArrowType,
) -> Result<Range<usize>> {
    let start = checked_size(offset, width, datatype)?;
    let len = checked_size(count, width, datatype)?;
    let end = start.checked_add(len).ok_or_else(|| {
        ColumnarError::new(format!("Byte range end overflows for '{datatype}'"))
    })?;
    Ok(start..end)
}

/// Offset buffer index for the offset width `O`.
fn offsets_index<O: OffsetIndex>(layout: &Layout) -> Result<usize> {
    if O::WIDTH == 4 {
        role_index(layout, layout.offset_buffer, "offsets")
    } else {
        role_index(layout, layout.large_offset_buffer, "large offsets")
    }
}

fn read_offset<O: OffsetIndex>(offsets: &[u8], idx: usize, datatype: &ArrowType) -> Result<i64> {
    read_value::<O>(offsets, idx)
        .map(|v| v.to_i64())
        .ok_or_else(|| {
            ColumnarError::new(format!(
                "Offset index {idx} out of bounds for '{datatype}' with {} offsets",
                offsets.len() / O::WIDTH
            ))
        })
}

fn offset_to_usize(offset: i64, datatype: &ArrowType) -> Result<usize> {
    usize::try_from(offset)
        .map_err(|_| ColumnarError::new(format!("Negative offset {offset} for '{datatype}'")))
}

/// Source and destination positions for a range delimited by offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OffsetSpan {
    /// Offset at the start of the source range.
    src_start: usize,
    /// Offset at the end of the source range.
    src_end: usize,
    /// Offset at the start of the destination range. Copied offsets are
    /// re-based onto this.
    dst_base: usize,
    /// Offset at the end of the destination range, fits the offset type.
    dst_end: usize,
}

impl OffsetSpan {
    const fn len(&self) -> usize {
        self.src_end - self.src_start
    }
}

/// Validate the offsets backing the source and destination ranges, and
/// compute the spans they delimit.
///
/// Nothing is written.
fn prepare_offsets<O: OffsetIndex>(
    dst: &ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
) -> Result<OffsetSpan> {
    let layout = src.layout();
    let datatype = &layout.datatype;
    let idx = offsets_index::<O>(layout)?;

    let src_offsets = buffer_ref(src, idx, "offsets")?;
    let src_start = read_offset::<O>(src_offsets, src_offset, datatype)?;
    let mut prev = src_start;
    for i in 1..=count {
        let next = read_offset::<O>(src_offsets, src_offset + i, datatype)?;
        if next < prev {
            return Err(ColumnarError::new(format!(
                "Source offsets for '{datatype}' decrease at index {}: {prev} > {next}",
                src_offset + i
            )));
        }
        prev = next;
    }

    let dst_offsets = buffer_ref(dst, idx, "offsets")?;
    check_buffer_len(
        "Destination offsets",
        datatype,
        dst_offsets.len(),
        (dst_offset + count + 1) * O::WIDTH,
    )?;
    let dst_base = read_offset::<O>(dst_offsets, dst_offset, datatype)?;

    let src_start = offset_to_usize(src_start, datatype)?;
    let src_end = offset_to_usize(prev, datatype)?;
    let dst_base = offset_to_usize(dst_base, datatype)?;

    let dst_end = dst_base
        .checked_add(src_end - src_start)
        .filter(|end| {
            i64::try_from(*end)
                .ok()
                .and_then(O::try_from_i64)
                .is_some()
        })
        .ok_or_else(|| {
            ColumnarError::new(format!(
                "Re-based offsets overflow for '{datatype}', base: {dst_base}, span: {}",
                src_end - src_start
            ))
        })?;

    Ok(OffsetSpan {
        src_start,
        src_end,
        dst_base,
        dst_end,
    })
}

/// Write `count + 1` source offsets into the destination, re-based onto the
/// destination's base offset.
fn write_offsets<O: OffsetIndex>(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    span: OffsetSpan,
) -> Result<()> {
    let layout = src.layout();
    let datatype = &layout.datatype;
    let idx = offsets_index::<O>(layout)?;

    let src_offsets = buffer_ref(src, idx, "offsets")?;
    let dst_offsets = buffer_mut(dst, idx, "offsets")?;

    // Both fit in i64, they were read from offsets.
    let src_start = span.src_start as i64;
    let dst_base = span.dst_base as i64;

    for i in 0..=count {
        let offset = read_offset::<O>(src_offsets, src_offset + i, datatype)?;
        let rebased = offset
            .checked_sub(src_start)
            .and_then(|delta| dst_base.checked_add(delta))
            .and_then(O::try_from_i64)
            .ok_or_else(|| {
                ColumnarError::new(format!(
                    "Re-based offset at index {} overflows offsets for '{datatype}'",
                    dst_offset + i
                ))
            })?;
        write_value(dst_offsets, dst_offset + i, rebased).required("destination offset slot")?;
    }

    Ok(())
}

fn copy_varlen<O: OffsetIndex>(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    let layout = src.layout();
    let span = prepare_offsets::<O>(dst, dst_offset, src, src_offset, count)?;

    let copy_data = selector.contains(BufferSelector::DATA);
    let data_idx = role_index(layout, layout.data_buffer, "data")?;
    if copy_data {
        let src_data = buffer_ref(src, data_idx, "data")?;
        check_buffer_len("Source data", &layout.datatype, src_data.len(), span.src_end)?;
        let dst_data = buffer_ref(dst, data_idx, "data")?;
        check_buffer_len(
            "Destination data",
            &layout.datatype,
            dst_data.len(),
            span.dst_end,
        )?;
    }

    if selector.contains(BufferSelector::OFFSETS) {
        write_offsets::<O>(dst, dst_offset, src, src_offset, count, span)?;
    }

    if copy_data {
        let src_data = buffer_ref(src, data_idx, "data")?;
        let dst_data = buffer_mut(dst, data_idx, "data")?;
        dst_data[span.dst_base..span.dst_end]
            .copy_from_slice(&src_data[span.src_start..span.src_end]);
    }

    Ok(())
}

fn copy_list<O: OffsetIndex>(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    let span = prepare_offsets::<O>(dst, dst_offset, src, src_offset, count)?;

    let copy_children = selector.contains(BufferSelector::CHILDREN);
    if copy_children {
        let src_child = src.child(0).required("list child")?;
        let dst_child = dst.child(0).required("list child")?;
        check_range("Source child", span.src_start, span.len(), src_child.len())?;
        check_range("Destination child", span.dst_base, span.len(), dst_child.len())?;
    }

    if selector.contains(BufferSelector::OFFSETS) {
        write_offsets::<O>(dst, dst_offset, src, src_offset, count, span)?;
    }

    if copy_children {
        let src_child = src.child(0).required("list child")?;
        let dst_child = dst.child_mut(0).required("list child")?;
        copy_inner(
            dst_child,
            span.dst_base,
            src_child,
            span.src_start,
            span.len(),
            selector,
        )?;
    }

    Ok(())
}

fn copy_container(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    if !selector.contains(BufferSelector::CHILDREN) {
        return Ok(());
    }

    // Fixed size lists map each element onto `size` consecutive child
    // elements, structs and maps map one to one.
    let size = match src.datatype() {
        ArrowType::FixedSizeList { size } => *size,
        _ => 1,
    };

    let datatype = src.datatype();
    let child_dst_offset = checked_size(dst_offset, size, datatype)?;
    let child_src_offset = checked_size(src_offset, size, datatype)?;
    let child_count = checked_size(count, size, datatype)?;

    for (idx, src_child) in src.children().iter().enumerate() {
        let dst_child = dst.child_mut(idx).required("container child")?;
        copy_inner(
            dst_child,
            child_dst_offset,
            src_child,
            child_src_offset,
            child_count,
            selector,
        )?;
    }

    Ok(())
}

/// Resolve the child index for each union type id in `types`.
fn union_child_indices(
    datatype: &ArrowType,
    types: &[u8],
    n_children: usize,
) -> Result<Vec<usize>> {
    types
        .iter()
        .map(|type_id| {
            let type_id = *type_id as i8;
            datatype
                .union_child_index(type_id)
                .filter(|idx| *idx < n_children)
                .ok_or_else(|| {
                    ColumnarError::new(format!(
                        "Union type id {type_id} doesn't map to any of the \
                         {n_children} children of '{datatype}'"
                    ))
                })
        })
        .collect()
}

fn copy_union_types(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
) -> Result<()> {
    let layout = src.layout();
    let idx = role_index(layout, layout.union_type_buffer, "union type")?;

    let src_types = buffer_ref(src, idx, "union type")?;
    let dst_types = buffer_mut(dst, idx, "union type")?;
    check_buffer_len(
        "Destination union type",
        &layout.datatype,
        dst_types.len(),
        dst_offset + count,
    )?;

    dst_types[dst_offset..dst_offset + count]
        .copy_from_slice(&src_types[src_offset..src_offset + count]);

    Ok(())
}

fn copy_sparse_union(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    let layout = src.layout();
    let types_idx = role_index(layout, layout.union_type_buffer, "union type")?;

    let src_types = buffer_ref(src, types_idx, "union type")?;
    check_buffer_len(
        "Source union type",
        &layout.datatype,
        src_types.len(),
        src_offset + count,
    )?;
    union_child_indices(
        &layout.datatype,
        &src_types[src_offset..src_offset + count],
        src.children().len(),
    )?;

    if selector.contains(BufferSelector::UNION_TYPES) {
        copy_union_types(dst, dst_offset, src, src_offset, count)?;
    }

    if selector.contains(BufferSelector::CHILDREN) {
        // Every child holds a slot for every element.
        for (idx, src_child) in src.children().iter().enumerate() {
            let dst_child = dst.child_mut(idx).required("union child")?;
            copy_inner(dst_child, dst_offset, src_child, src_offset, count, selector)?;
        }
    }

    Ok(())
}

/// A run of consecutive dense union slots that map to consecutive elements
/// of the same child in both source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChildRun {
    child: usize,
    src_offset: usize,
    dst_offset: usize,
    count: usize,
}

fn copy_dense_union(
    dst: &mut ArrayData,
    dst_offset: usize,
    src: &ArrayData,
    src_offset: usize,
    count: usize,
    selector: BufferSelector,
) -> Result<()> {
    let layout = src.layout();
    let datatype = &layout.datatype;
    let types_idx = role_index(layout, layout.union_type_buffer, "union type")?;
    let offsets_idx = role_index(layout, layout.offset_buffer, "offsets")?;
    let n_children = src.children().len();

    let src_types = buffer_ref(src, types_idx, "union type")?;
    check_buffer_len("Source union type", datatype, src_types.len(), src_offset + count)?;
    let src_children = union_child_indices(
        datatype,
        &src_types[src_offset..src_offset + count],
        n_children,
    )?;

    let src_offsets = buffer_ref(src, offsets_idx, "offsets")?;
    let mut src_child_offsets = Vec::with_capacity(count);
    for (i, child) in src_children.iter().enumerate() {
        let offset = read_offset::<i32>(src_offsets, src_offset + i, datatype)?;
        let offset = offset_to_usize(offset, datatype)?;
        let child_len = src.children()[*child].len();
        if offset >= child_len {
            return Err(ColumnarError::new(format!(
                "Union offset {offset} at index {} out of bounds for child {child} \
                 with length {child_len}",
                src_offset + i
            )));
        }
        src_child_offsets.push(offset);
    }

    // Each destination child is appended to at its current length, one past
    // the largest offset referenced by destination slots before the range.
    let dst_types = buffer_ref(dst, types_idx, "union type")?;
    let dst_offsets = buffer_ref(dst, offsets_idx, "offsets")?;
    check_buffer_len("Destination union type", datatype, dst_types.len(), dst_offset + count)?;
    check_buffer_len(
        "Destination offsets",
        datatype,
        dst_offsets.len(),
        (dst_offset + count) * i32::WIDTH,
    )?;

    let mut cursors = vec![0usize; n_children];
    for slot in 0..dst_offset {
        let type_id = dst_types[slot] as i8;
        let child = match datatype.union_child_index(type_id) {
            Some(child) if child < n_children => child,
            _ => continue,
        };
        let offset = read_offset::<i32>(dst_offsets, slot, datatype)?;
        if let Ok(offset) = usize::try_from(offset) {
            cursors[child] = cursors[child].max(offset + 1);
        }
    }

    let mut dst_child_offsets = Vec::with_capacity(count);
    for child in &src_children {
        let offset = cursors[*child];
        cursors[*child] += 1;
        dst_child_offsets.push(offset);
    }

    for (child, cursor) in cursors.iter().enumerate() {
        let child_len = dst.children()[child].len();
        if *cursor > child_len {
            return Err(ColumnarError::new(format!(
                "Destination union child {child} has length {child_len}, copy needs {cursor}"
            )));
        }
        if i32::try_from(*cursor).is_err() {
            return Err(ColumnarError::new(format!(
                "Union offset {cursor} overflows offsets for '{datatype}'"
            )));
        }
    }

    if selector.contains(BufferSelector::UNION_TYPES) {
        copy_union_types(dst, dst_offset, src, src_offset, count)?;
    }

    if selector.contains(BufferSelector::OFFSETS) {
        let dst_offsets = buffer_mut(dst, offsets_idx, "offsets")?;
        for (i, offset) in dst_child_offsets.iter().enumerate() {
            // Checked to fit above.
            write_value(dst_offsets, dst_offset + i, *offset as i32)
                .required("destination offset slot")?;
        }
    }

    if selector.contains(BufferSelector::CHILDREN) {
        let mut run: Option<ChildRun> = None;
        for i in 0..count {
            let child = src_children[i];
            let (src_child_offset, dst_child_offset) = (src_child_offsets[i], dst_child_offsets[i]);

            if let Some(r) = run.as_mut() {
                if r.child == child
                    && r.src_offset + r.count == src_child_offset
                    && r.dst_offset + r.count == dst_child_offset
                {
                    r.count += 1;
                    continue;
                }
            }

            if let Some(r) = run.take() {
                copy_child_run(dst, src, r, selector)?;
            }
            run = Some(ChildRun {
                child,
                src_offset: src_child_offset,
                dst_offset: dst_child_offset,
                count: 1,
            });
        }

        if let Some(r) = run {
            copy_child_run(dst, src, r, selector)?;
        }
    }

    Ok(())
}

fn copy_child_run(
    dst: &mut ArrayData,
    src: &ArrayData,
    run: ChildRun,
    selector: BufferSelector,
) -> Result<()> {
    let src_child = src.child(run.child).required("union child")?;
    let dst_child = dst.child_mut(run.child).required("union child")?;
    copy_inner(
        dst_child,
        run.dst_offset,
        src_child,
        run.src_offset,
        run.count,
        selector,
    )
}
