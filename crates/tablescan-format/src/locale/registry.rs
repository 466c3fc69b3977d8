use super::Locale;

/// Look up a locale by tag (`en`, `ru`), ASCII case-insensitive.
pub fn locale(tag: &str) -> Option<&'static Locale> {
    if tag.eq_ignore_ascii_case("en") {
        Some(&EN)
    } else if tag.eq_ignore_ascii_case("ru") {
        Some(&RU)
    } else {
        None
    }
}

pub static EN: Locale = Locale {
    tag: "en",
    decimal_separator: ".",
    thousand_separator: ",",
    weekday_names: [
        "Sunday",
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
    ],
    weekday_abbr: ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"],
    month_names: [
        "",
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ],
    month_names_genitive: [
        "",
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ],
    month_abbr: [
        "", "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ],
    builtin_formats: [
        "general",       // 0
        "0",             // 1
        "0.00",          // 2
        "#,##0",         // 3
        "#,##0.00",      // 4
        "#,##0",         // 5
        "#,##0",         // 6
        "#,##0.00",      // 7
        "#,##0.00",      // 8
        "0%",            // 9
        "0.00%",         // 10
        "0.00e+00",      // 11
        "#\" \"?/?",     // 12
        "# ??/??",       // 13
        "m/d/yyyy",      // 14
        "d-mmm-yy",      // 15
        "d-mmm",         // 16
        "mmm-yy",        // 17
        "h:mm am/pm",    // 18
        "h:mm:ss am/pm", // 19
        "h:mm",          // 20
        "h:mm:ss",       // 21
        "m/d/yyyy h:mm", // 22
        "general",       // 23
        "general",       // 24
        "general",       // 25
        "general",       // 26
        "m/d/yyyy",      // 27
        "m/d/yyyy",      // 28
        "m/d/yyyy",      // 29
        "m/d/yyyy",      // 30
        "m/d/yyyy",      // 31
        "h:mm:ss",       // 32
        "h:mm:ss",       // 33
        "h:mm:ss",       // 34
        "h:mm:ss",       // 35
        "m/d/yyyy",      // 36
        "#,##0",         // 37
        "#,##0",         // 38
        "#,##0.00",      // 39
        "#,##0.00",      // 40
        "#,##0",         // 41
        "#,##0",         // 42
        "#,##0.00",      // 43
        "#,##0.00",      // 44
        "mm:ss",         // 45
        "[h]:mm:ss",     // 46
        "mm:ss.0",       // 47
        "##0.0e+0",      // 48
        "@",             // 49
        "m/d/yyyy",      // 50
        "m/d/yyyy",      // 51
        "m/d/yyyy",      // 52
        "m/d/yyyy",      // 53
        "m/d/yyyy",      // 54
        "m/d/yyyy",      // 55
        "m/d/yyyy",      // 56
        "m/d/yyyy",      // 57
        "m/d/yyyy",      // 58
        "0",             // 59
        "0.00",          // 60
        "#,##0",         // 61
        "#,##0.00",      // 62
        "#,##0",         // 63
        "#,##0",         // 64
        "#,##0.00",      // 65
        "#,##0.00",      // 66
        "0%",            // 67
        "0.00%",         // 68
        "#\" \"?/?",     // 69
        "# ??/??",       // 70
        "m/d/yyyy",      // 71
        "m/d/yyyy",      // 72
        "d-mmm-yy",      // 73
        "d-mmm",         // 74
        "mmm-yy",        // 75
        "h:mm",          // 76
        "h:mm:ss",       // 77
        "m/d/yyyy h:mm", // 78
        "h:mm",          // 79
        "[h]:mm:ss",     // 80
        "mm:ss.0",       // 81
    ],
    system_formats: &[
        ("[$-F800]", "dddd, mmmm dd, yyyy"),
        ("[$-FC19]", "dddd, mmmm dd, yyyy"),
    ],
};

pub static RU: Locale = Locale {
    tag: "ru",
    decimal_separator: ",",
    thousand_separator: "\u{a0}",
    weekday_names: [
        "Воскресенье",
        "Понедельник",
        "Вторник",
        "Среда",
        "Четверг",
        "Пятница",
        "Суббота",
    ],
    weekday_abbr: ["ВС", "ПН", "ВТ", "СР", "ЧТ", "ПТ", "СБ"],
    month_names: [
        "",
        "Январь",
        "Февраль",
        "Март",
        "Апрель",
        "Май",
        "Июнь",
        "Июль",
        "Август",
        "Сентябрь",
        "Октябрь",
        "Ноябрь",
        "Декабрь",
    ],
    month_names_genitive: [
        "",
        "января",
        "февраля",
        "марта",
        "апреля",
        "мая",
        "июня",
        "июля",
        "августа",
        "сентября",
        "октября",
        "ноября",
        "декабря",
    ],
    month_abbr: [
        "", "янв", "фев", "мар", "апр", "май", "июн", "июл", "авг", "сен", "окт", "ноя", "дек",
    ],
    builtin_formats: [
        "general",          // 0
        "0",                // 1
        "0.00",             // 2
        "#,##0",            // 3
        "#,##0.00",         // 4
        "#,##0",            // 5
        "#,##0",            // 6
        "#,##0.00",         // 7
        "#,##0.00",         // 8
        "0%",               // 9
        "0.00%",            // 10
        "0.00e+00",         // 11
        "#\" \"?/?",        // 12
        "# ??/??",          // 13
        "dd.mm.yyyy",       // 14
        "dd.mmm.yy",        // 15
        "dd.mmm",           // 16
        "mmm.yy",           // 17
        "h:mm am/pm",       // 18
        "h:mm:ss am/pm",    // 19
        "h:mm",             // 20
        "h:mm:ss",          // 21
        "dd.mm.yyyy h:mm",  // 22
        "general",          // 23
        "general",          // 24
        "general",          // 25
        "general",          // 26
        "dd.mm.yyyy",       // 27
        "dd.mm.yyyy",       // 28
        "dd.mm.yyyy",       // 29
        "dd.mm.yyyy",       // 30
        "dd.mm.yyyy",       // 31
        "h:mm:ss",          // 32
        "h:mm:ss",          // 33
        "h:mm:ss",          // 34
        "h:mm:ss",          // 35
        "dd.mm.yyyy",       // 36
        "#,##0",            // 37
        "#,##0",            // 38
        "#,##0.00",         // 39
        "#,##0.00",         // 40
        "#,##0",            // 41
        "#,##0",            // 42
        "#,##0.00",         // 43
        "#,##0.00",         // 44
        "mm:ss",            // 45
        "[h]:mm:ss",        // 46
        "mm:ss.0",          // 47
        "##0.0e+0",         // 48
        "@",                // 49
        "dd.mm.yyyy",       // 50
        "dd.mm.yyyy",       // 51
        "dd.mm.yyyy",       // 52
        "dd.mm.yyyy",       // 53
        "dd.mm.yyyy",       // 54
        "dd.mm.yyyy",       // 55
        "dd.mm.yyyy",       // 56
        "dd.mm.yyyy",       // 57
        "dd.mm.yyyy",       // 58
        "0",                // 59
        "0.00",             // 60
        "#,##0",            // 61
        "#,##0.00",         // 62
        "#,##0",            // 63
        "#,##0",            // 64
        "#,##0.00",         // 65
        "#,##0.00",         // 66
        "0%",               // 67
        "0.00%",            // 68
        "#\" \"?/?",        // 69
        "# ??/??",          // 70
        "dd.mm.yyyy",       // 71
        "dd.mm.yyyy",       // 72
        "d.mmm.yy",         // 73
        "d.mmm",            // 74
        "mmm.yy",           // 75
        "h:mm",             // 76
        "h:mm:ss",          // 77
        "dd.mm.yyyy h:mm",  // 78
        "h:mm",             // 79
        "[h]:mm:ss",        // 80
        "mm:ss.0",          // 81
    ],
    system_formats: &[
        ("[$-F800]", "d mmmmm yyyy г."),
        ("[$-FC19]", "d mmmmm yyyy г."),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(locale("en").unwrap().tag, "en");
        assert_eq!(locale("RU").unwrap().tag, "ru");
        assert!(locale("de").is_none());
    }

    #[test]
    fn builtin_tables_cover_all_ids() {
        for l in [&EN, &RU] {
            assert_eq!(l.builtin_formats.len(), 82);
            assert!(l.builtin_formats.iter().all(|f| !f.is_empty()));
        }
    }
}
