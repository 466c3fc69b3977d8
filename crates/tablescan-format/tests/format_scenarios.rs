use pretty_assertions::assert_eq;
use tablescan_format::{locale, parse_number_format, CellFormatter, CellKind};

fn en_formatter() -> CellFormatter {
    CellFormatter::new(locale("en").unwrap())
}

#[test]
fn common_formats_render_as_a_spreadsheet_would() {
    let cases = [
        ("general", "1234567.89", CellKind::Numeric, "1234567.89"),
        ("#,##0.00", "1234567.89", CellKind::Numeric, "1,234,567.89"),
        ("0.00%", "0.125", CellKind::Numeric, "12.50%"),
        ("#,##0;(#,##0)", "-4200", CellKind::Numeric, "(4,200)"),
        ("m/d/yyyy", "44562", CellKind::Numeric, "1/1/2022"),
        ("@", "hello", CellKind::SharedString, "hello"),
    ];
    let formatter = en_formatter();
    for (code, raw, kind, expected) in cases {
        let parsed = parse_number_format(code);
        let (text, err) = formatter.format_value(raw, kind, &parsed);
        assert_eq!(err, None, "unexpected error for {code:?}");
        assert_eq!(text, expected, "format {code:?} applied to {raw:?}");
    }
}

#[test]
fn general_round_trips_without_scientific() {
    let formatter = en_formatter();
    let parsed = parse_number_format("general");
    for raw in [
        "0.1",
        "-12345.6789",
        "99999999999999",
        "0.00000000000001",
        "123456789.123456",
    ] {
        let value: f64 = raw.parse().unwrap();
        let (text, err) = formatter.format_value(raw, CellKind::Numeric, &parsed);
        assert_eq!(err, None);
        assert_eq!(text.parse::<f64>().unwrap(), value, "round-trip of {raw}");
        assert!(!text.contains('E') && !text.contains('e'));
    }
}

#[test]
fn negative_section_equals_positive_rendering_wrapped() {
    let formatter = en_formatter();
    let with_sections = parse_number_format("0.00;<0.00>");
    let positive_only = parse_number_format("0.00");
    for raw in ["1.5", "4200", "0.004"] {
        let (positive, _) = formatter.format_value(raw, CellKind::Numeric, &positive_only);
        let negated = format!("-{raw}");
        let (negative, _) = formatter.format_value(&negated, CellKind::Numeric, &with_sections);
        assert_eq!(negative, format!("<{positive}>"));
    }
}

#[test]
fn string_values_pass_through_non_text_formats() {
    let formatter = en_formatter();
    for code in ["0.00", "#,##0", "general", "m/d/yyyy"] {
        let parsed = parse_number_format(code);
        let (text, _) = formatter.format_value("plain", CellKind::InlineString, &parsed);
        assert_eq!(text, "plain", "string under {code:?}");
    }
}

#[test]
fn date_rendering_follows_the_locale() {
    // Serial 44927 is 2023-01-01, a Sunday.
    let mut formatter = en_formatter();
    let parsed = parse_number_format("dddd, mmmm dd, yyyy");
    let (text, _) = formatter.format_value("44927", CellKind::Numeric, &parsed);
    assert_eq!(text, "Sunday, January 01, 2023");

    formatter.set_locale(locale("ru").unwrap());
    let genitive = parse_number_format("d mmmmm yyyy г.");
    let (text, _) = formatter.format_value("44927", CellKind::Numeric, &genitive);
    assert_eq!(text, "1 января 2023 г.");
}

#[test]
fn twelve_and_twenty_four_hour_clocks() {
    let formatter = en_formatter();
    // Serial fraction 0.75 is 18:00.
    let (text, _) = formatter.format_value(
        "44927.75",
        CellKind::Numeric,
        &parse_number_format("h:mm am/pm"),
    );
    assert_eq!(text, "6:00 PM");

    let (text, _) = formatter.format_value(
        "44927.75",
        CellKind::Numeric,
        &parse_number_format("hh:mm:ss"),
    );
    assert_eq!(text, "18:00:00");
}

#[test]
fn elapsed_hours_drop_at_zero() {
    let formatter = en_formatter();
    let parsed = parse_number_format("[h]:mm:ss");
    // 1/32 of a day: 00:45:00.
    let (text, _) = formatter.format_value("0.03125", CellKind::Numeric, &parsed);
    assert_eq!(text, "45:00");
    // A quarter day: 06:00:00.
    let (text, _) = formatter.format_value("0.25", CellKind::Numeric, &parsed);
    assert_eq!(text, "06:00:00");
}

#[test]
fn fixed_date_format_overrides_the_cell_format() {
    let mut formatter = en_formatter();
    formatter.set_date_fixed_format(Some("yyyy-mm-dd".to_string()));
    let parsed = parse_number_format("m/d/yyyy");
    let (text, _) = formatter.format_value("44562", CellKind::Numeric, &parsed);
    assert_eq!(text, "2022-01-01");
}

#[test]
fn phantom_leap_day_and_its_neighbors() {
    let formatter = en_formatter();
    let parsed = parse_number_format("yyyy-mm-dd");
    let render = |serial: &str| formatter.format_value(serial, CellKind::Numeric, &parsed).0;
    assert_eq!(render("0"), "1899-12-30");
    assert_eq!(render("60"), "1900-02-29");
    assert_eq!(render("61"), "1900-03-01");
}

#[test]
fn russian_locale_changes_numeric_separators() {
    let formatter = CellFormatter::new(locale("ru").unwrap());
    let parsed = parse_number_format("#,##0.00");
    let (text, _) = formatter.format_value("1234567.89", CellKind::Numeric, &parsed);
    assert_eq!(text, "1\u{a0}234\u{a0}567,89");
}
