//! Per-locale formatting data: separators, month/weekday names, the built-in
//! number format table (ids 0-81), and system-format substitutions.

mod registry;

pub use registry::{locale, EN, RU};

/// Static formatting data for one locale.
#[derive(Debug)]
pub struct Locale {
    pub tag: &'static str,
    pub decimal_separator: &'static str,
    pub thousand_separator: &'static str,
    /// Indexed by weekday, Sunday first.
    pub weekday_names: [&'static str; 7],
    pub weekday_abbr: [&'static str; 7],
    /// Indexed by month number; slot 0 is unused.
    pub month_names: [&'static str; 13],
    /// Genitive/passive month forms used after a day number (`2 января`).
    /// Locales without a distinct form repeat the nominative one.
    pub month_names_genitive: [&'static str; 13],
    pub month_abbr: [&'static str; 13],
    /// Built-in number format codes for ids 0-81. Workbook-defined formats
    /// with the same ids override these.
    pub builtin_formats: [&'static str; 82],
    /// Exact system-format tokens (`[$-F800]`) mapped to the locale's long
    /// patterns.
    pub system_formats: &'static [(&'static str, &'static str)],
}
