use thiserror::Error;

use crate::datetime::render_serial_date;
use crate::locale::{Locale, EN};
use crate::parse::{FormatSection, ParsedNumberFormat};

/// Numbers at or above this magnitude switch `general` to scientific
/// notation (when scientific output is allowed).
const MAX_NON_SCIENTIFIC: f64 = 1e11;
/// Non-zero numbers below this magnitude switch `general` to scientific
/// notation (when scientific output is allowed).
const MIN_NON_SCIENTIFIC: f64 = 1e-9;

/// Cell value type, as tagged by the `t` attribute of a worksheet cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Error,
    Bool,
    SharedString,
    InlineString,
    FormulaString,
    /// Pre-formatted date text stored directly in the cell.
    Date,
    Numeric,
    Unknown,
}

impl CellKind {
    /// Map the worksheet `t` attribute. An absent attribute means numeric.
    pub fn from_tag(tag: &str) -> CellKind {
        match tag {
            "e" => CellKind::Error,
            "b" => CellKind::Bool,
            "s" => CellKind::SharedString,
            "inlineStr" => CellKind::InlineString,
            "str" => CellKind::FormulaString,
            "d" => CellKind::Date,
            "n" | "" => CellKind::Numeric,
            _ => CellKind::Unknown,
        }
    }
}

/// Why a value could not be rendered under its format. The formatter still
/// returns a best-effort string (usually the raw input) so scanning can
/// continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid value in bool cell")]
    InvalidBool,
    #[error("unsupported format for a string cell")]
    UnsupportedStringFormat,
    #[error("numeric cell value is not a number")]
    FloatParse,
    #[error("unknown cell type")]
    UnknownCellKind,
}

/// Applies a [`ParsedNumberFormat`] to raw cell text, producing the string a
/// spreadsheet application would display.
#[derive(Debug, Clone)]
pub struct CellFormatter {
    locale: &'static Locale,
    formatting_enabled: bool,
    scientific_allowed: bool,
    date_fixed_format: Option<String>,
    decimal_separator: String,
    thousand_separator: String,
    trim: bool,
    date1904: bool,
}

impl Default for CellFormatter {
    fn default() -> Self {
        CellFormatter::new(&EN)
    }
}

impl CellFormatter {
    pub fn new(locale: &'static Locale) -> Self {
        CellFormatter {
            locale,
            formatting_enabled: true,
            scientific_allowed: false,
            date_fixed_format: None,
            decimal_separator: locale.decimal_separator.to_string(),
            thousand_separator: locale.thousand_separator.to_string(),
            trim: false,
            date1904: false,
        }
    }

    /// Switch locales; separators reset to the locale defaults.
    pub fn set_locale(&mut self, locale: &'static Locale) {
        self.locale = locale;
        self.decimal_separator = locale.decimal_separator.to_string();
        self.thousand_separator = locale.thousand_separator.to_string();
    }

    pub fn set_formatting_enabled(&mut self, enabled: bool) {
        self.formatting_enabled = enabled;
    }

    pub fn set_scientific_allowed(&mut self, allowed: bool) {
        self.scientific_allowed = allowed;
    }

    /// Render every date cell with this format instead of the cell's own.
    pub fn set_date_fixed_format(&mut self, format: Option<String>) {
        self.date_fixed_format = format;
    }

    /// An empty separator restores the locale default.
    pub fn set_decimal_separator(&mut self, separator: &str) {
        self.decimal_separator = if separator.is_empty() {
            self.locale.decimal_separator.to_string()
        } else {
            separator.to_string()
        };
    }

    pub fn set_thousand_separator(&mut self, separator: &str) {
        self.thousand_separator = separator.to_string();
    }

    pub fn set_trim(&mut self, trim: bool) {
        self.trim = trim;
    }

    pub fn set_date1904(&mut self, date1904: bool) {
        self.date1904 = date1904;
    }

    /// Render a raw cell value. Returns the display string and, for values
    /// that could not be rendered faithfully, the reason; the string is then
    /// a best-effort fallback (usually the input).
    pub fn format_value(
        &self,
        raw: &str,
        kind: CellKind,
        format: &ParsedNumberFormat,
    ) -> (String, Option<ValueError>) {
        let (text, err) = self.format_inner(raw, kind, format);
        if err.is_none() && self.trim {
            (text.trim().to_string(), None)
        } else {
            (text, err)
        }
    }

    fn format_inner(
        &self,
        raw: &str,
        kind: CellKind,
        format: &ParsedNumberFormat,
    ) -> (String, Option<ValueError>) {
        if !self.formatting_enabled {
            return (raw.to_string(), None);
        }
        match kind {
            // Error cells carry display text already (`#NAME?`, `#DIV/0!`).
            CellKind::Error | CellKind::Date => (raw.to_string(), None),
            CellKind::Bool => match raw {
                "0" => ("FALSE".to_string(), None),
                "1" => ("TRUE".to_string(), None),
                _ => (raw.to_string(), Some(ValueError::InvalidBool)),
            },
            CellKind::SharedString | CellKind::InlineString | CellKind::FormulaString => {
                let text = &format.text;
                match text.reduced.as_str() {
                    "general" => (raw.to_string(), None),
                    "@" => (format!("{}{raw}{}", text.prefix, text.suffix), None),
                    // A text format with no `@` ignores the cell value: a
                    // format of `"Error"` renders every string as `Error`.
                    "" => (format!("{}{}", text.prefix, text.suffix), None),
                    _ => (raw.to_string(), Some(ValueError::UnsupportedStringFormat)),
                }
            }
            CellKind::Numeric => self.format_numeric(raw, format),
            CellKind::Unknown => (raw.to_string(), Some(ValueError::UnknownCellKind)),
        }
    }

    fn format_numeric(
        &self,
        raw: &str,
        format: &ParsedNumberFormat,
    ) -> (String, Option<ValueError>) {
        let trimmed = raw.trim();
        // An empty numeric cell renders as nothing.
        if trimmed.is_empty() {
            return (String::new(), None);
        }

        if format.is_time {
            return self.format_serial_date(trimmed, format);
        }

        let mut value: f64 = match trimmed.parse() {
            Ok(v) => v,
            Err(_) => return (trimmed.to_string(), Some(ValueError::FloatParse)),
        };

        // The zero section applies only to literal zero; a tiny positive
        // value that would *display* as zero still uses the positive section.
        let section: &FormatSection = if value > 0.0 {
            &format.positive
        } else if value < 0.0 {
            // A dedicated negative section supplies its own sign decoration
            // (commonly parentheses), so the value is made positive first.
            if format.negative_expects_positive {
                value = value.abs();
            }
            &format.negative
        } else {
            &format.zero
        };

        // The percent sign itself is already part of the prefix or suffix.
        if section.show_percent {
            value *= 100.0;
        }

        let rendered = match section.reduced.as_str() {
            "general" => {
                // Prefix, suffix, and percent scaling never apply to general.
                return match self.general_numeric(trimmed) {
                    Ok(mut text) => {
                        self.apply_separators(&mut text, "");
                        (text, None)
                    }
                    Err(_) => (trimmed.to_string(), None),
                };
            }
            "@" => raw.to_string(),
            "0" => format!("{value:.0}"),
            "#,##0" => {
                let mut text = format!("{value:.0}");
                self.apply_separators(&mut text, &self.thousand_separator);
                text
            }
            "###0.0" | "0.0" => self.fixed(value, 1, false),
            "###0.00" | "0.00" => self.fixed(value, 2, false),
            "###0.000" | "0.000" => self.fixed(value, 3, false),
            "###0.0000" | "0.0000" => self.fixed(value, 4, false),
            "#,##0.0" => self.fixed(value, 1, true),
            "#,##0.00" => self.fixed(value, 2, true),
            "#,##0.000" => self.fixed(value, 3, true),
            "#,##0.0000" => self.fixed(value, 4, true),
            core @ ("0.00e+00" | "##0.0e+0") => {
                let digits = if core.contains('+') { 2 } else { 1 };
                if self.scientific_allowed {
                    let mut text = scientific(value, digits);
                    self.apply_separators(&mut text, "");
                    return (text, None);
                }
                let mut text = trimmed.to_string();
                self.apply_separators(&mut text, "");
                return (text, None);
            }
            // An empty core renders nothing between the literals.
            "" => String::new(),
            // Anything else degrades to the raw number.
            _ => return (trimmed.to_string(), None),
        };
        (
            format!("{}{rendered}{}", section.prefix, section.suffix),
            None,
        )
    }

    fn fixed(&self, value: f64, precision: usize, grouped: bool) -> String {
        let mut text = format!("{value:.precision$}");
        let thousand = if grouped {
            self.thousand_separator.as_str()
        } else {
            ""
        };
        self.apply_separators(&mut text, thousand);
        text
    }

    fn format_serial_date(
        &self,
        trimmed: &str,
        format: &ParsedNumberFormat,
    ) -> (String, Option<ValueError>) {
        let serial: f64 = match trimmed.parse() {
            Ok(v) => v,
            Err(_) => return (trimmed.to_string(), Some(ValueError::FloatParse)),
        };
        let code = self
            .date_fixed_format
            .as_deref()
            .unwrap_or(format.code.as_str());
        (
            render_serial_date(serial, code, self.locale, self.date1904),
            None,
        )
    }

    /// Group the integer part by thousands and swap in the configured
    /// decimal separator. Grouping scans from the decimal point (or the end)
    /// leftward, stopping short of a leading sign.
    fn apply_separators(&self, rendered: &mut String, thousand_separator: &str) {
        let decimal_position = rendered.find('.').unwrap_or(rendered.len());
        let sign_len = usize::from(rendered.starts_with('-'));
        if !thousand_separator.is_empty() {
            let mut grouped = String::with_capacity(rendered.len() + 8);
            grouped.push_str(&rendered[..sign_len]);
            let integer = &rendered[sign_len..decimal_position];
            for (i, ch) in integer.chars().enumerate() {
                if i != 0 && (integer.len() - i) % 3 == 0 {
                    grouped.push_str(thousand_separator);
                }
                grouped.push(ch);
            }
            grouped.push_str(&rendered[decimal_position..]);
            *rendered = grouped;
        }
        if !self.decimal_separator.is_empty() && self.decimal_separator != "." {
            *rendered = rendered.replace('.', &self.decimal_separator);
        }
    }

    /// `general` rendering: shortest decimal form that round-trips, with an
    /// optional scientific branch for very small and very large magnitudes.
    fn general_numeric(&self, raw: &str) -> Result<String, ValueError> {
        if raw.trim().is_empty() {
            return Ok(String::new());
        }
        let value: f64 = raw.parse().map_err(|_| ValueError::FloatParse)?;
        if self.scientific_allowed {
            let magnitude = value.abs();
            // Anything smaller than the smallest positive double is zero.
            if (magnitude >= f64::MIN_POSITIVE && magnitude < MIN_NON_SCIENTIFIC)
                || magnitude >= MAX_NON_SCIENTIFIC
            {
                return Ok(shortest_scientific(value));
            }
        }
        // `{}` on f64 is the shortest decimal that reparses exactly and never
        // switches to exponent notation.
        Ok(format!("{value}"))
    }
}

/// Uppercase scientific notation with the shortest mantissa, a signed
/// exponent, and at least two exponent digits (`1.5E+11`, `1E-09`).
fn shortest_scientific(value: f64) -> String {
    let text = format!("{value:E}");
    let (mantissa, exponent) = text
        .split_once('E')
        .expect("{:E} always contains an exponent");
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(rest) => ('-', rest),
        None => ('+', exponent),
    };
    format!("{mantissa}E{sign}{digits:0>2}")
}

/// Lowercase scientific notation with a fixed mantissa precision, a signed
/// exponent, and at least two exponent digits (`1.23e+06`).
fn scientific(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return format!("{:.precision$}e+00", 0.0);
    }
    let mut exponent = value.abs().log10().floor() as i32;
    let mut mantissa = value / 10f64.powi(exponent);
    // Rounding the mantissa can carry it to 10.0.
    let rounded = format!("{:.precision$}", mantissa.abs());
    if rounded
        .split('.')
        .next()
        .is_some_and(|int_part| int_part.len() > 1)
    {
        mantissa /= 10.0;
        exponent += 1;
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa:.precision$}e{sign}{exp:0>2}", exp = exponent.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_number_format;
    use pretty_assertions::assert_eq;

    fn formatter() -> CellFormatter {
        CellFormatter::new(&EN)
    }

    fn format(fmt: &str, raw: &str, kind: CellKind) -> String {
        let parsed = parse_number_format(fmt);
        let (text, err) = formatter().format_value(raw, kind, &parsed);
        assert_eq!(err, None, "unexpected error for {fmt:?} / {raw:?}");
        text
    }

    #[test]
    fn bool_cells_render_keywords() {
        let parsed = parse_number_format("general");
        let f = formatter();
        assert_eq!(f.format_value("0", CellKind::Bool, &parsed).0, "FALSE");
        assert_eq!(f.format_value("1", CellKind::Bool, &parsed).0, "TRUE");
        let (text, err) = f.format_value("2", CellKind::Bool, &parsed);
        assert_eq!(text, "2");
        assert_eq!(err, Some(ValueError::InvalidBool));
    }

    #[test]
    fn general_preserves_the_number() {
        assert_eq!(
            format("general", "1234567.89", CellKind::Numeric),
            "1234567.89"
        );
    }

    #[test]
    fn grouped_two_decimals() {
        assert_eq!(
            format("#,##0.00", "1234567.89", CellKind::Numeric),
            "1,234,567.89"
        );
    }

    #[test]
    fn percent_scales_and_keeps_the_sign_glyph() {
        assert_eq!(format("0.00%", "0.125", CellKind::Numeric), "12.50%");
    }

    #[test]
    fn negative_section_wraps_in_parentheses() {
        assert_eq!(
            format("#,##0;(#,##0)", "-4200", CellKind::Numeric),
            "(4,200)"
        );
    }

    #[test]
    fn date_format_renders_serial() {
        assert_eq!(format("m/d/yyyy", "44562", CellKind::Numeric), "1/1/2022");
    }

    #[test]
    fn string_format_passes_text_through() {
        assert_eq!(format("@", "hello", CellKind::SharedString), "hello");
    }

    #[test]
    fn string_without_at_ignores_the_value() {
        let parsed = parse_number_format("0;-0;0;\"n/a\"");
        let (text, err) = formatter().format_value("x", CellKind::SharedString, &parsed);
        assert_eq!(text, "n/a");
        assert_eq!(err, None);
    }

    #[test]
    fn numeric_only_formats_leave_strings_alone() {
        let parsed = parse_number_format("0.00");
        // Single numeric section without `@`: text falls back to general.
        let (text, err) = formatter().format_value("abc", CellKind::SharedString, &parsed);
        assert_eq!(text, "abc");
        assert_eq!(err, None);
    }

    #[test]
    fn empty_numeric_cell_renders_empty() {
        assert_eq!(format("0.00", "  ", CellKind::Numeric), "");
    }

    #[test]
    fn unparsable_number_is_returned_with_error() {
        let parsed = parse_number_format("0.00");
        let (text, err) = formatter().format_value("12p", CellKind::Numeric, &parsed);
        assert_eq!(text, "12p");
        assert_eq!(err, Some(ValueError::FloatParse));
    }

    #[test]
    fn zero_section_applies_to_literal_zero_only() {
        let fmt = "0.00;(0.00);\"zero\"";
        assert_eq!(format(fmt, "0", CellKind::Numeric), "zero");
        assert_eq!(format(fmt, "0.004", CellKind::Numeric), "0.00");
    }

    #[test]
    fn scientific_formats_respect_the_toggle() {
        let mut f = formatter();
        let parsed = parse_number_format("0.00e+00");
        assert_eq!(
            f.format_value("1234567.89", CellKind::Numeric, &parsed).0,
            "1234567.89"
        );
        f.set_scientific_allowed(true);
        assert_eq!(
            f.format_value("1234567.89", CellKind::Numeric, &parsed).0,
            "1.23e+06"
        );
    }

    #[test]
    fn general_scientific_switches_at_the_boundaries() {
        let mut f = formatter();
        f.set_scientific_allowed(true);
        let parsed = parse_number_format("general");
        assert_eq!(f.format_value("1e11", CellKind::Numeric, &parsed).0, "1E+11");
        assert_eq!(
            f.format_value("99999999999", CellKind::Numeric, &parsed).0,
            "99999999999"
        );
        assert_eq!(f.format_value("1e-9", CellKind::Numeric, &parsed).0, "0.000000001");
        assert_eq!(f.format_value("9e-10", CellKind::Numeric, &parsed).0, "9E-10");
    }

    #[test]
    fn separators_follow_the_configuration() {
        let mut f = formatter();
        f.set_decimal_separator(",");
        f.set_thousand_separator(" ");
        let parsed = parse_number_format("#,##0.00");
        assert_eq!(
            f.format_value("1234567.89", CellKind::Numeric, &parsed).0,
            "1 234 567,89"
        );
    }

    #[test]
    fn disabled_formatting_passes_raw_values() {
        let mut f = formatter();
        f.set_formatting_enabled(false);
        let parsed = parse_number_format("0.00%");
        assert_eq!(f.format_value("0.125", CellKind::Numeric, &parsed).0, "0.125");
    }

    #[test]
    fn trim_strips_literal_padding() {
        let mut f = formatter();
        f.set_trim(true);
        let parsed = parse_number_format("0\" \"");
        let (text, _) = f.format_value("5", CellKind::Numeric, &parsed);
        assert_eq!(text, "5");
        // Idempotent: trimming an already-trimmed value changes nothing.
        let (again, _) = f.format_value(&text, CellKind::Numeric, &parsed);
        assert_eq!(again, "5");
    }

    #[test]
    fn grouping_respects_a_leading_sign() {
        let mut text = "-1234567".to_string();
        formatter().apply_separators(&mut text, ",");
        assert_eq!(text, "-1,234,567");
    }

    #[test]
    fn shortest_scientific_matches_expected_shape() {
        assert_eq!(shortest_scientific(1.5e11), "1.5E+11");
        assert_eq!(shortest_scientific(9e-10), "9E-10");
        assert_eq!(shortest_scientific(-2.25e13), "-2.25E+13");
    }

    #[test]
    fn fixed_precision_scientific_matches_expected_shape() {
        assert_eq!(scientific(1234567.89, 2), "1.23e+06");
        assert_eq!(scientific(0.00001234, 1), "1.2e-05");
        assert_eq!(scientific(9.99, 1), "1.0e+01");
        assert_eq!(scientific(-1234.5, 2), "-1.23e+03");
    }
}
