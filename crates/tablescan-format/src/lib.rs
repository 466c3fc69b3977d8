//! Excel-compatible number format parsing and display-text rendering.
//!
//! This crate turns raw cell values into the strings a spreadsheet
//! application would display:
//! - [`parse_number_format`] parses a number format code (`#,##0.00`,
//!   `m/d/yyyy`, `0%`, multi-section `positive;negative;zero;text` codes)
//!   into a [`ParsedNumberFormat`].
//! - [`CellFormatter`] applies a parsed format to a raw cell value, handling
//!   section selection, percent scaling, separator substitution, and
//!   serial-date rendering.
//! - [`locale`] carries per-locale separators, month/weekday names, and the
//!   built-in format table the ids 0-81 resolve against.
//!
//! Formatting is deliberately best-effort: a format code that cannot be
//! parsed degrades to `general`, and a value that cannot be rendered under
//! its format is returned as-is together with a typed error.

pub mod locale;

mod datetime;
mod parse;
mod value;

pub use crate::datetime::datetime_from_serial;
pub use crate::locale::{locale, Locale};
pub use crate::parse::{
    parse_number_format, FormatParseError, FormatSection, ParsedNumberFormat,
};
pub use crate::value::{CellFormatter, CellKind, ValueError};
