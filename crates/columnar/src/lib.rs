//! Arrow compatible buffer layouts and range copies between arrays.
//!
//! Format strings are decoded into a [`layout::Layout`] describing which
//! buffer holds what, and [`copy::copy_range`] copies element ranges between
//! arrays sharing a layout.
pub mod array;
pub mod bitmap;
pub mod buffer;
pub mod copy;
pub mod datatype;
pub mod format;
pub mod layout;
pub mod scalar;
pub mod status;
pub mod testutil;

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use crate::datatype::{ArrowType, TimeUnit};
    use crate::format::parse_format;
    use crate::layout::Layout;

    #[test]
    fn layout_roundtrip() {
        let layout = parse_format("tsu:UTC").unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        let got: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(layout, got);
        assert_eq!(
            &ArrowType::Timestamp {
                unit: TimeUnit::Microsecond,
                timezone: Some("UTC".to_string()),
            },
            got.datatype()
        );
    }
}
