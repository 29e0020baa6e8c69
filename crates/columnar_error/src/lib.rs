use std::error::Error;
use std::fmt;

pub type Result<T, E = ColumnarError> = std::result::Result<T, E>;

/// Errno value reported for invalid arguments.
pub const EINVAL: i32 = 22;
/// Errno value reported for recognized but unsupported functionality.
pub const ENOTSUP: i32 = 95;
/// Errno value reported for broken internal invariants.
pub const ENOTRECOVERABLE: i32 = 131;

/// Broad category of an error.
///
/// Each kind maps onto an errno-style code so that the error can be handed
/// to callers expecting a numeric status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, out of range parameters, mismatched layouts.
    InvalidArgument,
    /// Input that's understood but not supported.
    NotImplemented,
    /// Should be unreachable.
    Internal,
}

impl ErrorKind {
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument => EINVAL,
            Self::NotImplemented => ENOTSUP,
            Self::Internal => ENOTRECOVERABLE,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::NotImplemented => write!(f, "Not implemented"),
            Self::Internal => write!(f, "Internal error"),
        }
    }
}

#[derive(Debug)]
pub struct ColumnarError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl ColumnarError {
    /// Create a new invalid argument error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::InvalidArgument, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        ColumnarError {
            kind,
            msg: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotImplemented, msg)
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Errno-style code for this error.
    pub const fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn get_msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl fmt::Display for ColumnarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl Error for ColumnarError {}

/// Return early with a not implemented error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {
        return Err($crate::ColumnarError::not_implemented(format!(
            "Not implemented: {}",
            format!($($arg)+)
        )))
    };
}

pub trait OptionExt<T> {
    /// Return an invalid argument error with the given message if None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(ColumnarError::new(format!("Missing required value: {msg}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_implemented_fn(v: i32) -> Result<()> {
        not_implemented!("value {v}")
    }

    #[test]
    fn not_implemented_macro() {
        let err = not_implemented_fn(4).unwrap_err();
        assert_eq!(ErrorKind::NotImplemented, err.kind());
        assert_eq!(ENOTSUP, err.code());
        assert_eq!("Not implemented: value 4", err.get_msg());
    }

    #[test]
    fn display_includes_kind() {
        let err = ColumnarError::new("bad offsets");
        assert_eq!(EINVAL, err.code());
        assert_eq!("Invalid argument: bad offsets", err.to_string());
    }

    #[test]
    fn required_none() {
        let err = None::<i32>.required("offsets").unwrap_err();
        assert_eq!("Missing required value: offsets", err.get_msg());
    }
}
