use std::io;
use std::path::Path;

use tablescan_format::CellFormatter;

use crate::detect::{detect_workbook_kind, WorkbookKind};
use crate::error::{OpenError, ScanError};
use crate::flat_xml::FlatXmlScanner;
use crate::xls::XlsScanner;
use crate::xlsx::XlsxScanner;

/// How a sheet is exposed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideLevel {
    Visible,
    /// Hidden, but a user can unhide it from the application UI.
    Hidden,
    /// Hidden and only revealable through an editor or API.
    VeryHidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub hide_level: HideLevel,
}

/// A workbook scanner: one of the three backends behind a uniform row
/// iteration surface.
///
/// Rows arrive through repeated [`TableScanner::scan`] calls in strictly
/// increasing row order; gaps in the source's row numbering surface as empty
/// rows. [`TableScanner::scanned`] borrows the internal row buffer, which is
/// reused by the next `scan`.
#[derive(Debug)]
pub enum TableScanner {
    PackagedXml(XlsxScanner),
    FlatXml(FlatXmlScanner),
    LegacyBinary(XlsScanner),
}

impl TableScanner {
    /// Detect the file's format and open the matching backend.
    pub fn open(path: impl AsRef<Path>) -> Result<TableScanner, OpenError> {
        let path = path.as_ref();
        let detection = detect_workbook_kind(path)?;
        match detection.kind {
            WorkbookKind::PackagedXml => Ok(TableScanner::PackagedXml(XlsxScanner::open(path)?)),
            WorkbookKind::LegacyBinary => Ok(TableScanner::LegacyBinary(XlsScanner::open(path)?)),
            WorkbookKind::FlatXml => Ok(TableScanner::FlatXml(FlatXmlScanner::open(
                path,
                detection.encoding,
            )?)),
            kind @ (WorkbookKind::Html | WorkbookKind::Unknown) => {
                Err(OpenError::Unsupported(kind))
            }
        }
    }

    /// Ordered sheet descriptors.
    pub fn sheets(&self) -> &[SheetInfo] {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.sheets(),
            TableScanner::FlatXml(scanner) => scanner.sheets(),
            TableScanner::LegacyBinary(scanner) => scanner.sheets(),
        }
    }

    pub fn current_sheet_id(&self) -> usize {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.current_sheet_id(),
            TableScanner::FlatXml(scanner) => scanner.current_sheet_id(),
            TableScanner::LegacyBinary(scanner) => scanner.current_sheet_id(),
        }
    }

    /// Select a sheet by id; resets iteration state.
    pub fn set_sheet_id(&mut self, id: usize) -> Result<(), ScanError> {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.set_sheet_id(id),
            TableScanner::FlatXml(scanner) => scanner.set_sheet_id(id),
            TableScanner::LegacyBinary(scanner) => scanner.set_sheet_id(id),
        }
    }

    /// Advance one row. `Ok(true)` means [`TableScanner::scanned`] holds the
    /// row; `Ok(false)` is the end of the current sheet.
    pub fn scan(&mut self) -> Result<bool, ScanError> {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.scan(),
            TableScanner::FlatXml(scanner) => scanner.scan(),
            TableScanner::LegacyBinary(scanner) => scanner.scan(),
        }
    }

    /// Cells of the last emitted row, by column; empty while bridging a gap
    /// in the source's row numbering.
    pub fn scanned(&self) -> &[String] {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.scanned(),
            TableScanner::FlatXml(scanner) => scanner.scanned(),
            TableScanner::LegacyBinary(scanner) => scanner.scanned(),
        }
    }

    pub fn last_scan_error(&self) -> Option<&ScanError> {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.last_scan_error(),
            TableScanner::FlatXml(scanner) => scanner.last_scan_error(),
            TableScanner::LegacyBinary(scanner) => scanner.last_scan_error(),
        }
    }

    /// Switch the locale used for built-in formats, month/weekday names, and
    /// default separators.
    pub fn set_locale(&mut self, tag: &str) -> Result<(), ScanError> {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.set_locale(tag),
            TableScanner::FlatXml(scanner) => scanner.set_locale(tag),
            TableScanner::LegacyBinary(scanner) => scanner.set_locale(tag),
        }
    }

    /// Whether this backend formats cell values itself. The legacy binary
    /// and flat-XML backends surface pre-formatted text, so their formatter
    /// is not available.
    pub fn formatter_available(&self) -> bool {
        matches!(self, TableScanner::PackagedXml(_))
    }

    /// The value formatter, for backends that own one.
    pub fn formatter_mut(&mut self) -> Option<&mut CellFormatter> {
        match self {
            TableScanner::PackagedXml(scanner) => Some(scanner.formatter_mut()),
            _ => None,
        }
    }

    /// Release the underlying file handle. Dropping the scanner does the
    /// same; `close` exists for callers that want the `io::Result`.
    pub fn close(self) -> io::Result<()> {
        match self {
            TableScanner::PackagedXml(scanner) => scanner.close(),
            TableScanner::FlatXml(scanner) => scanner.close(),
            TableScanner::LegacyBinary(scanner) => scanner.close(),
        }
    }
}
