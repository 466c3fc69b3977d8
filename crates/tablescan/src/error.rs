use std::io;

use thiserror::Error;

use crate::detect::WorkbookKind;

/// Failure while probing a file's leading bytes.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("cannot open file for detection: {0}")]
    Open(#[source] io::Error),
    #[error("cannot read file signature: {0}")]
    Read(#[source] io::Error),
    #[error("file is empty")]
    ShortRead,
}

/// Failure while opening a workbook and loading its metadata.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("unsupported workbook format {0:?}")]
    Unsupported(WorkbookKind),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("required part {0} is missing from the package")]
    MissingPart(String),
    #[error("malformed xml in {part}: {message}")]
    Xml { part: String, message: String },
    #[error("legacy workbook error: {0}")]
    Legacy(String),
}

/// Failure while scanning rows. End-of-sheet is not an error; `scan`
/// signals it with `Ok(false)`.
///
/// Variants carry rendered messages rather than source errors so the value
/// can be both returned from `scan` and retained for `last_scan_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("sheet #{0} not found")]
    SheetOutOfRange(usize),
    #[error("cannot open sheet part {path}: {message}")]
    SheetOpen { path: String, message: String },
    #[error("xml error in {path} at byte {offset}: {message}")]
    Xml {
        path: String,
        offset: u64,
        message: String,
    },
    #[error("row number {value:?} is not an integer in {path}")]
    RowNumberNotInteger { path: String, value: String },
    #[error("row numbers are not strictly increasing ({previous} then {current}) in {path}")]
    RowNumbersNotIncreasing {
        path: String,
        previous: u64,
        current: u64,
    },
    #[error("cell index {column} in row {row} does not advance past earlier cells")]
    CellIndexCollision { row: u64, column: usize },
    #[error("attribute {attribute} of <{element}> is not an integer at byte {offset}")]
    AttributeNotInteger {
        element: &'static str,
        attribute: &'static str,
        offset: u64,
    },
    #[error("unknown locale {0:?}")]
    UnknownLocale(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::Io(err.to_string())
    }
}
