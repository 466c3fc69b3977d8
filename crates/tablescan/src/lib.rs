//! Streaming row reader for spreadsheet files.
//!
//! Three wire formats are supported behind one pull-based interface:
//! - ZIP-packaged OOXML workbooks (`.xlsx`), streamed sheet by sheet with
//!   shared-string and number-format resolution;
//! - legacy OLE2 binary workbooks (`.xls`), adapted over the `calamine`
//!   decoder;
//! - flat SpreadsheetML 2003 XML workbooks, indexed once and then streamed
//!   from per-sheet byte ranges.
//!
//! ```no_run
//! use tablescan::TableScanner;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scanner = TableScanner::open("report.xlsx")?;
//! for sheet in scanner.sheets() {
//!     println!("sheet: {}", sheet.name);
//! }
//! while scanner.scan()? {
//!     let row: Vec<&str> = scanner.scanned().iter().map(String::as_str).collect();
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Cell values come back as display text: the `.xlsx` backend applies the
//! cell's number format the way a spreadsheet application would (see the
//! `tablescan-format` crate), while the other backends surface the text
//! their sources already carry.

mod a1;
mod detect;
mod error;
mod flat_xml;
mod scanner;
mod xls;
mod xlsx;
mod xmlutil;

pub use crate::a1::{parse_cell_range, parse_cell_ref, CellRefError};
pub use crate::detect::{detect_workbook_kind, Detection, TextEncoding, WorkbookKind};
pub use crate::error::{DetectError, OpenError, ScanError};
pub use crate::flat_xml::FlatXmlScanner;
pub use crate::scanner::{HideLevel, SheetInfo, TableScanner};
pub use crate::xls::XlsScanner;
pub use crate::xlsx::XlsxScanner;

pub use tablescan_format::{CellFormatter, CellKind, ValueError};
