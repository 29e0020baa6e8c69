use columnar::format::parse_format;
use columnar::layout::Layout;
use columnar_error::{ColumnarError, ErrorKind, Result};
use libtest_mimic::{Arguments, Trial};
use logutil::LogFormat;

/// Expected layout for a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expected {
    n_buffers: usize,
    validity: Option<usize>,
    offsets: Option<usize>,
    large_offsets: Option<usize>,
    union_types: Option<usize>,
    data: Option<usize>,
    element_size: usize,
}

const fn expected(
    n_buffers: usize,
    validity: Option<usize>,
    offsets: Option<usize>,
    large_offsets: Option<usize>,
    union_types: Option<usize>,
    data: Option<usize>,
    element_size: usize,
) -> Expected {
    Expected {
        n_buffers,
        validity,
        offsets,
        large_offsets,
        union_types,
        data,
        element_size,
    }
}

const fn fixed(width: usize) -> Expected {
    expected(2, Some(0), None, None, None, Some(1), width)
}

const VARLEN: Expected = expected(3, Some(0), Some(1), None, None, Some(2), 0);
const LARGE_VARLEN: Expected = expected(3, Some(0), None, Some(1), None, Some(2), 0);
const CONTAINER: Expected = expected(1, Some(0), None, None, None, None, 0);

const CASES: &[(&str, Expected)] = &[
    ("n", expected(0, None, None, None, None, None, 0)),
    ("b", expected(2, Some(0), None, None, None, Some(1), 0)),
    ("c", fixed(1)),
    ("C", fixed(1)),
    ("s", fixed(2)),
    ("S", fixed(2)),
    ("i", fixed(4)),
    ("I", fixed(4)),
    ("l", fixed(8)),
    ("L", fixed(8)),
    ("e", fixed(2)),
    ("f", fixed(4)),
    ("g", fixed(8)),
    ("w:16", expected(1, None, None, None, None, Some(0), 16)),
    ("z", VARLEN),
    ("u", VARLEN),
    ("Z", LARGE_VARLEN),
    ("U", LARGE_VARLEN),
    ("d:10,2", fixed(16)),
    ("d:10,2,64", fixed(8)),
    ("d:5,-128", fixed(16)),
    ("tdD", fixed(4)),
    ("tdm", fixed(8)),
    ("tts", fixed(4)),
    ("ttn", fixed(8)),
    ("tsu:Europe/Paris", fixed(8)),
    ("tsn:", fixed(8)),
    ("tDs", fixed(8)),
    ("tiM", fixed(4)),
    ("tiD", fixed(8)),
    ("tin", fixed(16)),
    ("+l", expected(2, Some(0), Some(1), None, None, None, 0)),
    ("+L", expected(2, Some(0), None, Some(1), None, None, 0)),
    ("+w:4", CONTAINER),
    ("+s", CONTAINER),
    ("+m", CONTAINER),
    ("+ud", expected(3, None, Some(2), None, Some(1), None, 0)),
    ("+us", expected(2, None, None, None, Some(1), None, 0)),
];

const INVALID: &[(&str, ErrorKind)] = &[
    ("", ErrorKind::InvalidArgument),
    ("w", ErrorKind::InvalidArgument),
    ("w:", ErrorKind::InvalidArgument),
    ("w:0", ErrorKind::InvalidArgument),
    ("w:2147483648", ErrorKind::InvalidArgument),
    ("+w:2147483648", ErrorKind::InvalidArgument),
    ("+ux", ErrorKind::InvalidArgument),
    ("bogus", ErrorKind::InvalidArgument),
    ("+z", ErrorKind::InvalidArgument),
    ("tsx", ErrorKind::InvalidArgument),
    ("tss", ErrorKind::InvalidArgument),
    ("d:5,128", ErrorKind::InvalidArgument),
    ("vu", ErrorKind::NotImplemented),
    ("+r", ErrorKind::NotImplemented),
];

fn check_layout(format: &str, want: Expected) -> Result<()> {
    let layout = parse_format(format)?;
    let got = actual(&layout);
    if got != want {
        return Err(ColumnarError::new(format!(
            "Layout mismatch for '{format}'\n got: {got:?}\nwant: {want:?}"
        )));
    }

    // Canonical rendering decodes to the same layout.
    let rendered = layout.datatype.format_string();
    let reparsed = parse_format(&rendered)?;
    if reparsed != layout {
        return Err(ColumnarError::new(format!(
            "Format '{format}' rendered as '{rendered}' which decodes differently"
        )));
    }

    Ok(())
}

fn actual(layout: &Layout) -> Expected {
    expected(
        layout.n_buffers,
        layout.validity_buffer,
        layout.offset_buffer,
        layout.large_offset_buffer,
        layout.union_type_buffer,
        layout.data_buffer,
        layout.element_size_bytes,
    )
}

fn check_invalid(format: &str, kind: ErrorKind) -> Result<()> {
    match parse_format(format) {
        Ok(layout) => Err(ColumnarError::new(format!(
            "Expected '{format}' to fail, decoded to {layout:?}"
        ))),
        Err(e) if e.kind() == kind => Ok(()),
        Err(e) => Err(ColumnarError::new(format!(
            "Expected {kind} for '{format}', got: {e}"
        ))),
    }
}

pub fn main() {
    let args = Arguments::from_args();
    logutil::configure_global_logger(tracing::Level::ERROR, LogFormat::HumanReadable);

    let valid = CASES.iter().map(|(format, want)| {
        Trial::test(format!("format_table/{format}"), move || {
            check_layout(format, *want).map_err(|e| e.into())
        })
        .with_kind("format")
    });

    let invalid = INVALID.iter().map(|(format, kind)| {
        Trial::test(format!("format_invalid/'{format}'"), move || {
            check_invalid(format, *kind).map_err(|e| e.into())
        })
        .with_kind("format")
    });

    let tests = valid.chain(invalid).collect();

    libtest_mimic::run(&args, tests).exit_if_failed();
}
