use columnar::array::ArrayData;
use columnar::copy::{copy_range, BufferSelector};
use columnar::scalar::ScalarValue;
use columnar::status::{copy_with_status, Status};
use columnar::testutil::{
    assert_arrays_eq, binary_array, dense_union_array, int32_array, list_array, utf8_array,
    values_of, zeroed_like,
};
use columnar_error::{ColumnarError, Result, EINVAL};
use libtest_mimic::{Arguments, Trial};
use logutil::LogFormat;

/// Copy a source array in chunks into a fresh destination, then compare.
fn chunked_copy(src: &ArrayData, dst: &mut ArrayData, chunk: usize) -> Result<()> {
    let mut offset = 0;
    while offset < src.len() {
        let count = chunk.min(src.len() - offset);
        copy_range(dst, offset, src, offset, count, BufferSelector::ALL)?;
        offset += count;
    }
    Ok(())
}

fn strings_in_chunks() -> Result<()> {
    let words = [
        Some("alpha"),
        None,
        Some(""),
        Some("delta"),
        Some("epsilon"),
        None,
        Some("eta"),
        Some("theta"),
        Some("iota"),
        Some(""),
        Some("lambda"),
    ];
    let src = utf8_array(&words);

    for chunk in [1, 2, 3, 7, 11] {
        let mut dst = zeroed_like(&src, src.len(), 64);
        chunked_copy(&src, &mut dst, chunk)?;
        assert_arrays_eq(&src, &dst);
    }

    Ok(())
}

fn binary_unaligned_validity() -> Result<()> {
    let values: Vec<Option<&[u8]>> = (0..20)
        .map(|idx| if idx % 3 == 0 { None } else { Some(b"ab".as_slice()) })
        .collect();
    let src = binary_array(&values);
    let mut dst = zeroed_like(&src, 25, 64);

    copy_range(&mut dst, 5, &src, 0, 20, BufferSelector::ALL)?;

    for idx in 0..20 {
        let want = src.scalar(idx);
        let got = dst.scalar(idx + 5);
        if want != got {
            return Err(ColumnarError::new(format!(
                "Value mismatch at {idx}, want: {want:?}, got: {got:?}"
            )));
        }
    }

    Ok(())
}

fn list_sub_range() -> Result<()> {
    let child = int32_array(&[Some(1), Some(2), Some(3), None, Some(5), Some(6), Some(7)]);
    let src = list_array(child, &[0, 3, 3, 4, 7], &[true, true, false, true]);

    let dst_child = zeroed_like(src.child(0).unwrap(), 4, 0);
    let mut dst = ArrayData::new_zeroed(src.layout().clone(), 2, true, 0, vec![dst_child])?;

    copy_range(&mut dst, 0, &src, 2, 2, BufferSelector::ALL)?;

    // Spanned source child elements are 3..7.
    let expected_child = int32_array(&[None, Some(5), Some(6), Some(7)]);
    assert_arrays_eq(&expected_child, dst.child(0).unwrap());
    assert_eq!(
        vec![
            ScalarValue::Null,
            ScalarValue::List(vec![
                ScalarValue::Int32(5),
                ScalarValue::Int32(6),
                ScalarValue::Int32(7)
            ]),
        ],
        values_of(&dst)
    );

    Ok(())
}

fn dense_union_round_trip() -> Result<()> {
    let src = dense_union_array(
        "+ud:0,1",
        &[0, 0, 1, 0, 1],
        &[0, 1, 0, 2, 1],
        vec![
            int32_array(&[Some(10), Some(20), Some(30)]),
            utf8_array(&[Some("a"), Some("b")]),
        ],
    );

    for chunk in [1, 2, 5] {
        let mut dst = ArrayData::new_zeroed(
            src.layout().clone(),
            5,
            false,
            0,
            vec![
                zeroed_like(src.child(0).unwrap(), 3, 0),
                zeroed_like(src.child(1).unwrap(), 2, 8),
            ],
        )?;
        chunked_copy(&src, &mut dst, chunk)?;
        assert_arrays_eq(&src, &dst);
    }

    Ok(())
}

fn status_reports_range_error() -> Result<()> {
    let src = int32_array(&[Some(1), Some(2)]);
    let mut dst = int32_array(&[Some(3)]);
    let mut status = Status::new();

    let code = copy_with_status(&mut dst, 0, &src, 0, 2, BufferSelector::ALL.bits(), &mut status);
    if code != EINVAL {
        return Err(ColumnarError::new(format!("Unexpected status: {status}")));
    }
    assert_eq!(Some(ScalarValue::Int32(3)), dst.scalar(0));

    Ok(())
}

pub fn main() {
    let args = Arguments::from_args();
    logutil::configure_global_logger(tracing::Level::ERROR, LogFormat::HumanReadable);

    let cases: [(&str, fn() -> Result<()>); 5] = [
        ("strings_in_chunks", strings_in_chunks),
        ("binary_unaligned_validity", binary_unaligned_validity),
        ("list_sub_range", list_sub_range),
        ("dense_union_round_trip", dense_union_round_trip),
        ("status_reports_range_error", status_reports_range_error),
    ];

    let tests = cases
        .into_iter()
        .map(|(name, f)| {
            Trial::test(format!("copy/{name}"), move || f().map_err(|e| e.into())).with_kind("copy")
        })
        .collect();

    libtest_mimic::run(&args, tests).exit_if_failed();
}
