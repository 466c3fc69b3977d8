use thiserror::Error;

/// Why a format section (or a whole format code) failed to parse.
///
/// A failing section never aborts formatting: it degrades to the `general`
/// fallback and the first error encountered is recorded on the
/// [`ParsedNumberFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatParseError {
    #[error("unmatched double quote in format code")]
    UnmatchedQuote,
    #[error("unmatched bracket in format code")]
    UnmatchedBracket,
    #[error("malformed currency annotation in format code")]
    MalformedCurrency,
    #[error("unsupported or unescaped character in format code")]
    UnsupportedCharacter,
    #[error("too many format sections")]
    TooManySections,
    #[error("unsupported literal text after the number portion")]
    TrailingTokens,
}

/// One `;`-delimited section of a format code, reduced to the pieces the
/// renderer needs: a literal prefix, a core made only of formatting sigils,
/// and a literal suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSection {
    /// The section text as written in the format code.
    pub full: String,
    /// The sigil-only core (`0`, `#,##0.00`, `@`, ...) used as the dispatch
    /// key when rendering, or the token `general`.
    pub reduced: String,
    pub prefix: String,
    pub suffix: String,
    /// A `%` appeared in the literals; the value is scaled by 100.
    pub show_percent: bool,
    pub is_time: bool,
}

impl FormatSection {
    pub(crate) fn general() -> Self {
        FormatSection {
            full: "general".to_string(),
            reduced: "general".to_string(),
            prefix: String::new(),
            suffix: String::new(),
            show_percent: false,
            is_time: false,
        }
    }
}

/// A parsed number format code.
///
/// The four section slots are always populated; when the code supplies fewer
/// sections the remaining slots reuse another section per the 1/2/3/4-section
/// rules, and a time format keeps the whole code in [`ParsedNumberFormat::code`]
/// (time codes are never split on `;`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNumberFormat {
    pub code: String,
    pub is_time: bool,
    /// A dedicated negative section exists, so negative values are made
    /// positive before rendering (the section supplies its own sign marks).
    pub negative_expects_positive: bool,
    pub positive: FormatSection,
    pub negative: FormatSection,
    pub zero: FormatSection,
    pub text: FormatSection,
    /// First error hit while parsing; the affected sections fell back to
    /// `general`.
    pub parse_error: Option<FormatParseError>,
}

/// Multi-character sigils first so `0/`, `E+` and friends are consumed as
/// units.
const FORMATTING_SIGILS: &[&str] = &[
    "0/", "#/", "?/", "E-", "E+", "e-", "e+", "0", "#", "?", ".", ",", "@", "*",
];

const TIME_TOKENS: &[&str] = &[
    "m", "d", "yy", "h", "m", "AM/PM", "A/P", "am/pm", "a/p", "r", "g", "e", "b1", "b2", "[hh]",
    "[h]", "[mm]", "[m]", "s.0000", "s.000", "s.00", "s.0", "s", "[ss].0000", "[ss].000",
    "[ss].00", "[ss].0", "[ss]", "[s].0000", "[s].000", "[s].00", "[s].0", "[s]", "г", "г.",
];

/// Characters that may appear unescaped in a literal run.
fn is_literal_symbol(b: u8) -> bool {
    matches!(
        b,
        b'$' | b'-'
            | b'+'
            | b'/'
            | b'('
            | b')'
            | b':'
            | b'!'
            | b'^'
            | b'&'
            | b'\''
            | b'~'
            | b'{'
            | b'}'
            | b'<'
            | b'>'
            | b'='
            | b' '
    )
}

/// Parse a number format code. Never fails outright: broken sections fall
/// back to `general` and the first error is recorded on the result.
pub fn parse_number_format(code: &str) -> ParsedNumberFormat {
    let code = if code.is_empty() { "general" } else { code };

    if is_time_format(code) {
        // Time formats have exactly one section; `;` never splits them.
        // String cells are unaffected by a time format.
        let mut time = FormatSection::general();
        time.is_time = true;
        return ParsedNumberFormat {
            code: code.to_string(),
            is_time: true,
            negative_expects_positive: false,
            positive: time.clone(),
            negative: time.clone(),
            zero: time,
            text: FormatSection::general(),
            parse_error: None,
        };
    }

    let mut parse_error = None;
    let mut sections = Vec::new();
    match split_sections(code) {
        Ok(parts) => {
            for part in parts {
                match parse_section(part) {
                    Ok(section) => sections.push(section),
                    Err(err) => {
                        sections.push(FormatSection::general());
                        parse_error.get_or_insert(err);
                    }
                }
            }
        }
        Err(err) => {
            sections.push(FormatSection::general());
            parse_error.get_or_insert(err);
        }
    }
    if sections.len() > 4 {
        sections = vec![FormatSection::general()];
        parse_error.get_or_insert(FormatParseError::TooManySections);
    }

    let (negative_expects_positive, positive, negative, zero, text) = match sections.len() {
        1 => {
            let only = sections.remove(0);
            // A single section also formats text, but only when it actually
            // references the cell value with `@`.
            let text = if only.full.contains('@') {
                only.clone()
            } else {
                FormatSection::general()
            };
            (false, only.clone(), only.clone(), only, text)
        }
        2 => {
            // positive & zero; negative. The negative section renders the
            // absolute value and carries its own sign decoration.
            let negative = sections.remove(1);
            let positive = sections.remove(0);
            (
                true,
                positive.clone(),
                negative,
                positive,
                FormatSection::general(),
            )
        }
        3 => {
            let zero = sections.remove(2);
            let negative = sections.remove(1);
            let positive = sections.remove(0);
            (true, positive, negative, zero, FormatSection::general())
        }
        _ => {
            let text = sections.remove(3);
            let zero = sections.remove(2);
            let negative = sections.remove(1);
            let positive = sections.remove(0);
            (true, positive, negative, zero, text)
        }
    };

    ParsedNumberFormat {
        code: code.to_string(),
        is_time: false,
        negative_expects_positive,
        positive,
        negative,
        zero,
        text,
        parse_error,
    }
}

/// Split a format code on `;`, honoring `\x` escapes and quoted spans.
fn split_sections(code: &str) -> Result<Vec<&str>, FormatParseError> {
    let bytes = code.as_bytes();
    let mut sections = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                sections.push(&code[start..i]);
                start = i + 1;
            }
            b'\\' => i += 1,
            b'"' => match code[i + 1..].find('"') {
                Some(end) => i += end + 1,
                None => return Err(FormatParseError::UnmatchedQuote),
            },
            _ => {}
        }
        i += 1;
    }
    sections.push(&code[start..]);
    Ok(sections)
}

fn parse_section(full: &str) -> Result<FormatSection, FormatParseError> {
    let trimmed = full.trim();

    // `general` (and an empty section) bypass the literal/core machinery.
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("general") {
        return Ok(FormatSection::general());
    }

    let (prefix, rest, percent_prefix) = parse_literals(trimmed)?;
    let (reduced, suffix_format) = split_core_and_suffix(rest);
    let (suffix, remaining, percent_suffix) = parse_literals(suffix_format)?;
    if !remaining.is_empty() {
        // Codes can interleave literals with placeholders (Excel's SSN format
        // is `000\-00\-0000`). Those are rare and not supported; the caller
        // falls back to `general`.
        return Err(FormatParseError::TrailingTokens);
    }

    Ok(FormatSection {
        full: full.to_string(),
        reduced: reduced.to_string(),
        prefix,
        suffix,
        show_percent: percent_prefix || percent_suffix,
        is_time: false,
    })
}

/// Consume a literal run. Returns the accumulated literal, the unconsumed
/// tail (starting at the first formatting sigil), and whether a `%` was seen.
fn parse_literals(format: &str) -> Result<(String, &str, bool), FormatParseError> {
    let bytes = format.as_bytes();
    let mut literal = String::new();
    let mut show_percent = false;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &format[i..];
        match bytes[i] {
            b'\\' => {
                // The escaped character joins the literal.
                if let Some(next) = rest[1..].chars().next() {
                    literal.push(next);
                    i += 1 + next.len_utf8();
                } else {
                    i += 1;
                }
            }
            b'_' => {
                // Spacing hint: the next character is measured, not printed.
                // Without cell metrics there is nothing to reserve.
                match rest[1..].chars().next() {
                    Some(next) => i += 1 + next.len_utf8(),
                    None => i += 1,
                }
            }
            b'*' => {
                // Fill directive; meaningless without a cell width.
                i += 1;
            }
            b'"' => match rest[1..].find('"') {
                Some(end) => {
                    literal.push_str(&rest[1..end + 1]);
                    i += end + 2;
                }
                None => return Err(FormatParseError::UnmatchedQuote),
            },
            b'%' => {
                show_percent = true;
                literal.push('%');
                i += 1;
            }
            b'[' => {
                // Bracket annotations: `[$<currency>-<lcid>]` contributes the
                // currency glyph; colors and conditionals are dropped.
                let close = rest
                    .find(']')
                    .ok_or(FormatParseError::UnmatchedBracket)?;
                if rest.len() > 2 && bytes[i + 1] == b'$' {
                    match rest.find('-') {
                        Some(dash) if dash < close => literal.push_str(&rest[2..dash]),
                        _ => return Err(FormatParseError::MalformedCurrency),
                    }
                }
                i += close + 1;
            }
            b if is_literal_symbol(b) => {
                literal.push(b as char);
                i += 1;
            }
            _ => {
                if FORMATTING_SIGILS.iter().any(|s| rest.starts_with(s)) {
                    // Start of the number portion; the literal run is done.
                    return Ok((literal, rest, show_percent));
                }
                return Err(FormatParseError::UnsupportedCharacter);
            }
        }
    }
    Ok((literal, "", show_percent))
}

/// Split off the maximal leading run of formatting sigils; the remainder is
/// the suffix literal.
fn split_core_and_suffix(format: &str) -> (&str, &str) {
    let mut i = 0;
    while i < format.len() {
        match FORMATTING_SIGILS.iter().find(|s| format[i..].starts_with(**s)) {
            Some(sigil) => i += sigil.len(),
            None => break,
        }
    }
    format.split_at(i)
}

/// Classify a format code as a time format.
///
/// Walks the code treating escapes, quoted spans, and the literal symbol set
/// the same way the section parser does, and looks for at least one time
/// token. An invalid byte means the code is not a time format (it may still
/// be a valid number format).
pub(crate) fn is_time_format(format: &str) -> bool {
    let bytes = format.as_bytes();
    let mut found_time_token = false;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &format[i..];
        match bytes[i] {
            b'\\' | b'_' => match rest[1..].chars().next() {
                Some(next) => i += 1 + next.len_utf8(),
                None => i += 1,
            },
            b'*' => i += 1,
            b'"' => match rest[1..].find('"') {
                Some(end) => i += end + 2,
                None => return false,
            },
            // `.` and `,` show up unescaped in real-world time codes
            // (`mm:ss.0`, `d mmm, yyyy`).
            b'.' | b',' => i += 1,
            b if is_literal_symbol(b) => i += 1,
            _ => {
                if let Some(token) = TIME_TOKENS.iter().find(|t| rest.starts_with(**t)) {
                    found_time_token = true;
                    i += token.len();
                    continue;
                }
                if bytes[i] == b'[' {
                    // Checked after the token set: elapsed-time tokens like
                    // `[h]` are bracketed themselves. Anything else bracketed
                    // (colors, currencies, conditionals) is skipped.
                    match rest.find(']') {
                        Some(close) => i += close + 1,
                        None => return false,
                    }
                    continue;
                }
                return false;
            }
        }
    }
    found_time_token
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_section_is_used_for_every_sign() {
        let parsed = parse_number_format("0.00");
        assert_eq!(parsed.positive.reduced, "0.00");
        assert_eq!(parsed.negative.reduced, "0.00");
        assert_eq!(parsed.zero.reduced, "0.00");
        assert!(!parsed.negative_expects_positive);
        // No `@`, so text falls back to general.
        assert_eq!(parsed.text.reduced, "general");
    }

    #[test]
    fn single_section_with_at_also_formats_text() {
        let parsed = parse_number_format("\"val: \"@");
        assert_eq!(parsed.text.reduced, "@");
        assert_eq!(parsed.text.prefix, "val: ");
    }

    #[test]
    fn two_sections_share_positive_for_zero() {
        let parsed = parse_number_format("#,##0;(#,##0)");
        assert!(parsed.negative_expects_positive);
        assert_eq!(parsed.positive.reduced, "#,##0");
        assert_eq!(parsed.zero.reduced, "#,##0");
        assert_eq!(parsed.negative.prefix, "(");
        assert_eq!(parsed.negative.suffix, ")");
    }

    #[test]
    fn four_sections_fill_every_slot() {
        let parsed = parse_number_format("0;(0);\"-\";\"txt: \"@");
        assert_eq!(parsed.zero.prefix, "-");
        assert_eq!(parsed.zero.reduced, "");
        assert_eq!(parsed.text.prefix, "txt: ");
    }

    #[test]
    fn five_sections_degrade_to_general() {
        let parsed = parse_number_format("0;0;0;0;0");
        assert_eq!(parsed.parse_error, Some(FormatParseError::TooManySections));
        assert_eq!(parsed.positive.reduced, "general");
    }

    #[test]
    fn quoted_semicolon_does_not_split() {
        let parsed = parse_number_format("\"a;b\"0");
        assert_eq!(parsed.positive.prefix, "a;b");
        assert_eq!(parsed.positive.reduced, "0");
    }

    #[test]
    fn escaped_semicolon_does_not_split() {
        assert_eq!(split_sections("0\\;0").unwrap(), vec!["0\\;0"]);
    }

    #[test]
    fn unmatched_quote_is_an_error() {
        let parsed = parse_number_format("\"abc");
        assert_eq!(parsed.parse_error, Some(FormatParseError::UnmatchedQuote));
        assert_eq!(parsed.positive.reduced, "general");
    }

    #[test]
    fn percent_joins_literal_and_sets_flag() {
        let parsed = parse_number_format("0.00%");
        assert!(parsed.positive.show_percent);
        assert_eq!(parsed.positive.suffix, "%");
        assert_eq!(parsed.positive.reduced, "0.00");
    }

    #[test]
    fn currency_annotation_contributes_the_glyph() {
        let parsed = parse_number_format("[$€-407]#,##0.00");
        assert_eq!(parsed.positive.prefix, "€");
        assert_eq!(parsed.positive.reduced, "#,##0.00");
    }

    #[test]
    fn malformed_currency_annotation_is_an_error() {
        let parsed = parse_number_format("[$€]0");
        assert_eq!(
            parsed.parse_error,
            Some(FormatParseError::MalformedCurrency)
        );
    }

    #[test]
    fn color_annotation_is_dropped() {
        let parsed = parse_number_format("[Red]0.00");
        assert_eq!(parsed.positive.prefix, "");
        assert_eq!(parsed.positive.reduced, "0.00");
    }

    #[test]
    fn interleaved_literals_are_rejected() {
        let parsed = parse_number_format("000\\-00\\-0000");
        assert_eq!(parsed.parse_error, Some(FormatParseError::TrailingTokens));
    }

    #[test]
    fn general_is_case_insensitive() {
        assert_eq!(parse_number_format("GENERAL").positive.reduced, "general");
        assert_eq!(parse_number_format("").positive.reduced, "general");
    }

    #[test]
    fn date_codes_classify_as_time() {
        assert!(is_time_format("m/d/yyyy"));
        assert!(is_time_format("h:mm:ss am/pm"));
        assert!(is_time_format("[h]:mm:ss"));
        assert!(is_time_format("mm:ss.0"));
        assert!(is_time_format("d mmmm yyyy г."));
    }

    #[test]
    fn numeric_codes_do_not_classify_as_time() {
        assert!(!is_time_format("0.00"));
        assert!(!is_time_format("#,##0"));
        assert!(!is_time_format("0.00e+00"));
        assert!(!is_time_format("general"));
    }

    #[test]
    fn time_format_keeps_whole_code() {
        let parsed = parse_number_format("m/d/yy h:mm");
        assert!(parsed.is_time);
        assert!(parsed.positive.is_time);
        assert_eq!(parsed.code, "m/d/yy h:mm");
        // String cells are unaffected by a time format.
        assert_eq!(parsed.text.reduced, "general");
    }

    #[test]
    fn escape_prefix_joins_literal() {
        let parsed = parse_number_format("\\r0");
        assert_eq!(parsed.positive.prefix, "r");
        assert_eq!(parsed.positive.reduced, "0");
    }

    #[test]
    fn underscore_discards_the_spacer() {
        let parsed = parse_number_format("_-0");
        assert_eq!(parsed.positive.prefix, "");
        assert_eq!(parsed.positive.reduced, "0");
    }

    #[test]
    fn accounting_style_sections_parse() {
        let parsed = parse_number_format(r#"_(* #,##0.00_);_(* \(#,##0.00\);_(* "-"??_);_(@_)"#);
        assert_eq!(parsed.parse_error, None);
        assert_eq!(parsed.positive.reduced, "#,##0.00");
        assert_eq!(parsed.negative.prefix, " (");
        assert_eq!(parsed.negative.suffix, ")");
        assert_eq!(parsed.zero.prefix, " -");
        assert_eq!(parsed.zero.reduced, "??");
        assert_eq!(parsed.text.reduced, "@");
    }
}
