use std::borrow::BorrowMut;

/// Number of bytes needed to hold `bits` bits.
pub const fn num_bytes_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Get the bit at the given position of an LSB ordered byte slice.
///
/// Panics if out of bounds.
#[inline]
pub fn get_bit(data: &[u8], idx: usize) -> bool {
    data[idx / 8] & (1 << (idx % 8)) != 0
}

/// Set the bit at the given position of an LSB ordered byte slice.
///
/// Panics if out of bounds.
#[inline]
pub fn set_bit(data: &mut [u8], idx: usize, val: bool) {
    if val {
        data[idx / 8] |= 1 << (idx % 8);
    } else {
        data[idx / 8] &= !(1 << (idx % 8));
    }
}

/// Set `len` bits starting at `offset` to `val`.
///
/// Bits outside of the range are left untouched.
pub fn set_bits(data: &mut [u8], offset: usize, len: usize, val: bool) {
    let mut idx = offset;
    let end = offset + len;

    while idx < end && idx % 8 != 0 {
        set_bit(data, idx, val);
        idx += 1;
    }

    let fill = if val { 0xFF } else { 0x00 };
    while idx + 8 <= end {
        data[idx / 8] = fill;
        idx += 8;
    }

    while idx < end {
        set_bit(data, idx, val);
        idx += 1;
    }
}

/// Count the number of unset bits in `len` bits starting at `offset`.
pub fn count_unset(data: &[u8], offset: usize, len: usize) -> usize {
    (offset..offset + len)
        .filter(|idx| !get_bit(data, *idx))
        .count()
}

/// Copy `len` bits from `src` starting at bit `src_offset` into `dst`
/// starting at bit `dst_offset`.
///
/// Bits in `dst` outside of `dst_offset..dst_offset+len` are left untouched.
/// Neither offset needs to be byte aligned.
///
/// Panics if either range is out of bounds, callers are expected to check
/// lengths first.
pub fn copy_bits(src: &[u8], src_offset: usize, dst: &mut [u8], dst_offset: usize, len: usize) {
    let mut copied = 0;

    // Leading bits until the destination is byte aligned.
    while copied < len && (dst_offset + copied) % 8 != 0 {
        let bit = get_bit(src, src_offset + copied);
        set_bit(dst, dst_offset + copied, bit);
        copied += 1;
    }

    // Whole destination bytes, assembled from a shifted window over two
    // source bytes.
    let shift = (src_offset + copied) % 8;
    while len - copied >= 8 {
        let src_byte = (src_offset + copied) / 8;
        let byte = if shift == 0 {
            src[src_byte]
        } else {
            let lo = src[src_byte] >> shift;
            let hi = src.get(src_byte + 1).copied().unwrap_or(0) << (8 - shift);
            lo | hi
        };
        dst[(dst_offset + copied) / 8] = byte;
        copied += 8;
    }

    // Trailing bits.
    while copied < len {
        let bit = get_bit(src, src_offset + copied);
        set_bit(dst, dst_offset + copied, bit);
        copied += 1;
    }
}

/// An LSB ordered bitmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    len: usize,
    data: Vec<u8>,
}

impl Bitmap {
    pub fn from_bool_iter(iter: impl IntoIterator<Item = bool>) -> Self {
        let mut iter = iter.into_iter();

        let mut data = Vec::new();
        let mut len = 0;

        loop {
            let mut byte = 0;
            let mut bit_len = 0;

            for (idx, bit) in iter.borrow_mut().take(8).enumerate() {
                bit_len += 1;
                if bit {
                    byte |= 1 << idx;
                }
            }

            // No more bits, exit loop.
            if bit_len == 0 {
                break;
            }

            // Push byte, continue loop to get next 8 values.
            data.push(byte);
            len += bit_len;
        }

        Bitmap { len, data }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self::from_bool_iter(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit by bit reference copy.
    fn copy_bits_naive(
        src: &[u8],
        src_offset: usize,
        dst: &mut [u8],
        dst_offset: usize,
        len: usize,
    ) {
        for idx in 0..len {
            set_bit(dst, dst_offset + idx, get_bit(src, src_offset + idx));
        }
    }

    fn bits_of(bm: &Bitmap) -> Vec<bool> {
        (0..bm.len()).map(|idx| get_bit(bm.data(), idx)).collect()
    }

    #[test]
    fn simple() {
        let bits = [true, false, true, false, true, true, true, true];
        let bm = Bitmap::from_bool_iter(bits);

        assert_eq!(8, bm.len());
        assert_eq!(&[0b1111_0101], bm.data());
        assert_eq!(bits.as_slice(), bits_of(&bm));
    }

    #[test]
    fn not_multiple_of_eight() {
        let bits = [
            true, false, true, false, true, true, true, true, //
            true, false, true, false,
        ];
        let bm = Bitmap::from_bool_iter(bits);

        assert_eq!(12, bm.len());
        assert_eq!(2, bm.data().len());
        assert_eq!(bits.as_slice(), bits_of(&bm));
    }

    #[test]
    fn collect_empty() {
        let bm: Bitmap = std::iter::empty().collect();
        assert!(bm.is_empty());
        assert!(bm.into_data().is_empty());
    }

    #[test]
    fn copy_five_bits_unaligned_source() {
        // Source bits 3..8 are 1, 1, 0, 1, 0.
        let src = [0b0101_1000u8, 0xFF];
        let mut dst = [0b1111_1111u8, 0b0000_0000];

        copy_bits(&src, 3, &mut dst, 6, 5);

        // Bits 0..6 of dst untouched (all ones), bits 6..11 are copied, rest
        // of second byte untouched (zero).
        let got: Vec<_> = (0..16).map(|idx| get_bit(&dst, idx)).collect();
        let expected = [
            true, true, true, true, true, true, true, true, //
            false, true, false, false, false, false, false, false,
        ];
        assert_eq!(expected.as_slice(), got);
    }

    #[test]
    fn copy_bits_matches_naive() {
        let src: Vec<u8> = (0..8u8).map(|b| b.wrapping_mul(37) ^ 0x5A).collect();

        for src_offset in 0..10 {
            for dst_offset in 0..10 {
                for len in [0, 1, 7, 8, 9, 17, 40] {
                    let mut expected = vec![0xA5; 8];
                    let mut got = expected.clone();

                    copy_bits_naive(&src, src_offset, &mut expected, dst_offset, len);
                    copy_bits(&src, src_offset, &mut got, dst_offset, len);

                    assert_eq!(
                        expected, got,
                        "src_offset: {src_offset}, dst_offset: {dst_offset}, len: {len}"
                    );
                }
            }
        }
    }

    #[test]
    fn copy_bits_source_ends_mid_byte() {
        // Exactly enough source bytes for the range.
        let src = [0xFFu8, 0x01];
        let mut dst = [0u8; 2];

        copy_bits(&src, 1, &mut dst, 0, 8);
        assert_eq!([0xFF, 0x00], dst);
    }

    #[test]
    fn set_bits_range() {
        let mut data = [0u8; 3];
        set_bits(&mut data, 5, 12, true);
        assert_eq!([0b1110_0000, 0xFF, 0b0000_0001], data);

        set_bits(&mut data, 6, 2, false);
        assert_eq!([0b0010_0000, 0xFF, 0b0000_0001], data);
        assert_eq!(2, count_unset(&data, 5, 4));
    }
}
