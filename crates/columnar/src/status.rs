use std::fmt;

use columnar_error::{ColumnarError, Result};

use crate::array::ArrayData;
use crate::copy::{copy_range, BufferSelector};
use crate::format::parse_format;
use crate::layout::Layout;

/// Reusable record of the outcome of the last operation.
///
/// A code of zero means success, otherwise the code is the errno style code
/// of the error and the message its rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    code: i32,
    message: String,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.code = 0;
        self.message.clear();
    }

    pub fn set_error(&mut self, err: &ColumnarError) {
        self.code = err.code();
        self.message = err.to_string();
    }

    pub const fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Reset the status, recording the error if `result` failed.
    ///
    /// The result is passed through unchanged.
    pub fn capture<T>(&mut self, result: Result<T>) -> Result<T> {
        self.reset();
        if let Err(e) = &result {
            self.set_error(e);
        }
        result
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "OK")
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

/// Decode a format string, recording the outcome in `status`.
pub fn parse_format_with_status(format: &str, status: &mut Status) -> Option<Layout> {
    status.capture(parse_format(format)).ok()
}

/// Copy a range using signed offsets and raw selector bits, recording the
/// outcome in `status`.
///
/// Returns the status code.
pub fn copy_with_status(
    dst: &mut ArrayData,
    dst_offset: i64,
    src: &ArrayData,
    src_offset: i64,
    count: i64,
    selector_bits: u32,
    status: &mut Status,
) -> i32 {
    let result = signed_copy(dst, dst_offset, src, src_offset, count, selector_bits);
    let _ = status.capture(result);
    status.code()
}

fn signed_copy(
    dst: &mut ArrayData,
    dst_offset: i64,
    src: &ArrayData,
    src_offset: i64,
    count: i64,
    selector_bits: u32,
) -> Result<()> {
    let to_usize = |name: &str, v: i64| {
        usize::try_from(v).map_err(|_| ColumnarError::new(format!("Negative {name}: {v}")))
    };

    let selector = BufferSelector::from_bits(selector_bits).ok_or_else(|| {
        ColumnarError::new(format!("Unknown buffer selector bits: {selector_bits:#x}"))
    })?;

    copy_range(
        dst,
        to_usize("destination offset", dst_offset)?,
        src,
        to_usize("source offset", src_offset)?,
        to_usize("count", count)?,
        selector,
    )
}

#[cfg(test)]
mod tests {
    use columnar_error::{EINVAL, ENOTRECOVERABLE};

    use super::*;
    use crate::testutil::{int32_array, utf8_array};

    #[test]
    fn capture_ok_resets() {
        let mut status = Status::new();
        status.set_error(&ColumnarError::internal("broken"));
        assert_eq!(ENOTRECOVERABLE, status.code());

        let v = status.capture(Ok(4)).unwrap();
        assert_eq!(4, v);
        assert!(status.is_ok());
        assert_eq!("", status.message());
        assert_eq!("OK", status.to_string());
    }

    #[test]
    fn parse_with_status() {
        let mut status = Status::new();

        let layout = parse_format_with_status("+us", &mut status).unwrap();
        assert_eq!(2, layout.n_buffers);
        assert!(status.is_ok());

        assert!(parse_format_with_status("bogus", &mut status).is_none());
        assert_eq!(EINVAL, status.code());
        assert!(status.message().contains("bogus"));
    }

    #[test]
    fn copy_with_negative_offset() {
        let src = int32_array(&[Some(1)]);
        let mut dst = int32_array(&[Some(2)]);
        let mut status = Status::new();

        let selector = BufferSelector::ALL.bits();
        let code = copy_with_status(&mut dst, -1, &src, 0, 1, selector, &mut status);
        assert_eq!(EINVAL, code);
        assert!(status.message().contains("Negative destination offset"));
        assert_eq!(Some(crate::scalar::ScalarValue::Int32(2)), dst.scalar(0));
    }

    #[test]
    fn copy_with_unknown_selector() {
        let src = utf8_array(&[Some("a")]);
        let mut dst = utf8_array(&[Some("b")]);
        let mut status = Status::new();

        let code = copy_with_status(&mut dst, 0, &src, 0, 1, 1 << 12, &mut status);
        assert_eq!(EINVAL, code);
    }

    #[test]
    fn copy_with_status_ok() {
        let src = int32_array(&[Some(1), Some(5)]);
        let mut dst = int32_array(&[Some(2)]);
        let mut status = Status::new();

        let selector = BufferSelector::ALL.bits();
        let code = copy_with_status(&mut dst, 0, &src, 1, 1, selector, &mut status);
        assert_eq!(0, code);
        assert_eq!(Some(crate::scalar::ScalarValue::Int32(5)), dst.scalar(0));
    }
}
