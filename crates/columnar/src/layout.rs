use columnar_error::{ColumnarError, Result};

use crate::datatype::{ArrowType, DataKind, LayoutCategory};

/// The role a physical buffer plays for an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BufferRole {
    /// One bit per element, 1 is valid.
    Validity,
    /// 32-bit offsets into the data buffer, a child array, or (for dense
    /// unions) the selected child.
    Offsets,
    /// 64-bit offsets.
    LargeOffsets,
    /// One byte type id per union slot.
    UnionTypes,
    /// Payload bytes or bits.
    Data,
    /// A declared slot that's never accessed.
    Reserved,
}

/// Buffer layout for a single logical type.
///
/// Produced by the format decoder and never modified afterwards. Child arrays
/// carry their own layouts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    pub datatype: ArrowType,
    pub category: LayoutCategory,
    /// Total number of buffer slots for the array itself.
    pub n_buffers: usize,
    /// Size of a single element in the data buffer. Zero if elements aren't
    /// fixed width.
    pub element_size_bytes: usize,
    pub validity_buffer: Option<usize>,
    pub offset_buffer: Option<usize>,
    pub large_offset_buffer: Option<usize>,
    pub data_buffer: Option<usize>,
    pub union_type_buffer: Option<usize>,
}

impl Layout {
    /// Create the layout for a type using the category role table.
    pub fn new(datatype: ArrowType) -> Self {
        let category = datatype.category();
        let roles = category.roles();
        let element_size_bytes = match roles.data_kind {
            DataKind::Fixed => datatype.element_width().unwrap_or(0),
            _ => 0,
        };

        Layout {
            datatype,
            category,
            n_buffers: roles.n_buffers,
            element_size_bytes,
            validity_buffer: roles.validity,
            offset_buffer: roles.offsets,
            large_offset_buffer: roles.large_offsets,
            data_buffer: roles.data,
            union_type_buffer: roles.union_types,
        }
    }

    pub fn datatype(&self) -> &ArrowType {
        &self.datatype
    }

    pub fn data_kind(&self) -> DataKind {
        self.category.roles().data_kind
    }

    /// Get the role of the buffer at the given index.
    pub fn buffer_role(&self, idx: usize) -> Option<BufferRole> {
        if idx >= self.n_buffers {
            return None;
        }

        let role = if self.validity_buffer == Some(idx) {
            BufferRole::Validity
        } else if self.offset_buffer == Some(idx) {
            BufferRole::Offsets
        } else if self.large_offset_buffer == Some(idx) {
            BufferRole::LargeOffsets
        } else if self.union_type_buffer == Some(idx) {
            BufferRole::UnionTypes
        } else if self.data_buffer == Some(idx) {
            BufferRole::Data
        } else {
            BufferRole::Reserved
        };

        Some(role)
    }

    /// Iterate over all buffer slots and their roles.
    pub fn buffer_roles(&self) -> impl Iterator<Item = (usize, BufferRole)> + '_ {
        (0..self.n_buffers).filter_map(|idx| self.buffer_role(idx).map(|role| (idx, role)))
    }

    /// Check that role indices are consistent with the buffer count and with
    /// each other.
    pub fn validate(&self) -> Result<()> {
        let indices = [
            ("validity", self.validity_buffer),
            ("offset", self.offset_buffer),
            ("large offset", self.large_offset_buffer),
            ("data", self.data_buffer),
            ("union type", self.union_type_buffer),
        ];

        for (name, idx) in indices {
            if let Some(idx) = idx {
                if idx >= self.n_buffers {
                    return Err(ColumnarError::internal(format!(
                        "{name} buffer index {idx} out of range for {} buffers in layout for '{}'",
                        self.n_buffers, self.datatype
                    )));
                }
            }
        }

        if self.offset_buffer.is_some() && self.large_offset_buffer.is_some() {
            return Err(ColumnarError::internal(format!(
                "Layout for '{}' has both offset and large offset buffers",
                self.datatype
            )));
        }

        match self.data_kind() {
            DataKind::Fixed if self.element_size_bytes == 0 => {
                return Err(ColumnarError::internal(format!(
                    "Fixed width layout for '{}' has zero element size",
                    self.datatype
                )))
            }
            DataKind::Variable
                if self.offset_buffer.is_none() && self.large_offset_buffer.is_none() =>
            {
                return Err(ColumnarError::internal(format!(
                    "Variable width layout for '{}' missing offsets",
                    self.datatype
                )))
            }
            _ => (),
        }

        Ok(())
    }
}
