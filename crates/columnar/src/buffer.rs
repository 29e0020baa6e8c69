use std::fmt::Debug;

use columnar_error::{ColumnarError, Result};

use crate::bitmap::Bitmap;

/// Fixed width values that can be read from and written to byte buffers
/// using native endianness.
pub trait NativeType: Debug + Clone + Copy + PartialEq + Default + Send + Sync {
    const WIDTH: usize;

    /// Read a value from a slice of exactly `WIDTH` bytes.
    fn read_from(bytes: &[u8]) -> Self;

    /// Write a value into a slice of exactly `WIDTH` bytes.
    fn write_to(self, bytes: &mut [u8]);
}

macro_rules! impl_native_type {
    ($($ty:ty),*) => {
        $(
            impl NativeType for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_from(bytes: &[u8]) -> Self {
                    let mut buf = [0; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(buf)
                }

                #[inline]
                fn write_to(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_ne_bytes())
                }
            }
        )*
    };
}

impl_native_type!(i8, i16, i32, i64, i128, u8, u16, u32, u64, f32, f64, half::f16);

/// Integer types used for offsets.
pub trait OffsetIndex: NativeType + Eq + Ord {
    const ZERO: Self;

    fn to_i64(self) -> i64;

    /// Convert from an i64, returning None if the value doesn't fit.
    fn try_from_i64(v: i64) -> Option<Self>;
}

impl OffsetIndex for i32 {
    const ZERO: Self = 0;

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn try_from_i64(v: i64) -> Option<Self> {
        i32::try_from(v).ok()
    }
}

impl OffsetIndex for i64 {
    const ZERO: Self = 0;

    fn to_i64(self) -> i64 {
        self
    }

    fn try_from_i64(v: i64) -> Option<Self> {
        Some(v)
    }
}

/// Read the value at `idx` from a byte slice holding values of type `T`.
#[inline]
pub fn read_value<T: NativeType>(bytes: &[u8], idx: usize) -> Option<T> {
    let start = idx.checked_mul(T::WIDTH)?;
    let end = start.checked_add(T::WIDTH)?;
    bytes.get(start..end).map(T::read_from)
}

/// Write `val` at `idx` into a byte slice holding values of type `T`.
#[inline]
pub fn write_value<T: NativeType>(bytes: &mut [u8], idx: usize, val: T) -> Option<()> {
    let start = idx.checked_mul(T::WIDTH)?;
    let end = start.checked_add(T::WIDTH)?;
    bytes.get_mut(start..end).map(|b| val.write_to(b))
}

/// A fixed size byte buffer backing one buffer slot of an array.
///
/// Buffers are sized when created and never grow. Writes only happen within
/// the existing bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer(Vec<u8>);

impl Buffer {
    pub fn zeroed(len: usize) -> Self {
        Buffer(vec![0; len])
    }

    /// Copies values into a new buffer.
    pub fn from_values<T: NativeType>(values: &[T]) -> Self {
        let mut data = vec![0; values.len() * T::WIDTH];
        for (chunk, val) in data.chunks_exact_mut(T::WIDTH).zip(values) {
            val.write_to(chunk);
        }
        Buffer(data)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn get<T: NativeType>(&self, idx: usize) -> Option<T> {
        read_value(&self.0, idx)
    }

    pub fn set<T: NativeType>(&mut self, idx: usize, val: T) -> Result<()> {
        let len = self.0.len();
        write_value(&mut self.0, idx, val).ok_or_else(|| {
            ColumnarError::new(format!(
                "Index {idx} out of bounds for buffer of {len} bytes with {} byte values",
                T::WIDTH
            ))
        })
    }

    /// Interpret the entire buffer as values of `T`.
    ///
    /// Trailing bytes that don't make up a whole value are ignored.
    pub fn to_values<T: NativeType>(&self) -> Vec<T> {
        self.0.chunks_exact(T::WIDTH).map(T::read_from).collect()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(value: Vec<u8>) -> Self {
        Buffer(value)
    }
}

impl From<&[u8]> for Buffer {
    fn from(value: &[u8]) -> Self {
        Buffer(value.to_vec())
    }
}

impl From<Bitmap> for Buffer {
    fn from(value: Bitmap) -> Self {
        Buffer(value.into_data())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
