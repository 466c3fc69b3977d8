use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::locale::Locale;

/// Modified-Julian-day epoch as a Julian day number.
const MJD_0: f64 = 2_400_000.5;
/// Modified Julian day of the 1900-system day zero (1899-12-30).
const MJD_1900: f64 = 15018.0;
/// Modified Julian day of the 1904-system day zero (1904-01-01).
const MJD_1904: f64 = 16480.0;
const NANOS_IN_A_DAY: f64 = 86_400_000_000_000.0;

/// Convert a spreadsheet serial day count to a civil date-time.
///
/// Serials with a whole part `<= 61` go through a Julian-day bridge: the
/// 1900 date system pretends 1900 was a leap year, so plain epoch arithmetic
/// would disagree with what spreadsheets display in that range. Later
/// serials add whole days and a nanosecond-scaled fraction to the epoch.
pub fn datetime_from_serial(serial: f64, date1904: bool) -> NaiveDateTime {
    let whole_days = serial.trunc() as i64;
    if whole_days <= 61 {
        let offset = if date1904 { MJD_1904 } else { MJD_1900 };
        return julian_to_datetime(MJD_0, serial + offset);
    }
    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
    .expect("epoch is a valid date");
    let fraction = serial - whole_days as f64;
    let midnight = (epoch + Duration::days(whole_days))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");
    midnight + Duration::nanoseconds((NANOS_IN_A_DAY * fraction) as i64)
}

/// Civil fields used by the date renderer.
///
/// Distinct from [`NaiveDateTime`] because the 1900 system contains one date
/// chrono cannot represent: serial 60 displays as the spurious 1900-02-29.
pub(crate) struct SerialDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// 0 = Sunday.
    pub weekday: usize,
}

pub(crate) fn serial_date_time(serial: f64, date1904: bool) -> SerialDateTime {
    let dt = datetime_from_serial(serial, date1904);
    let mut fields = SerialDateTime {
        year: dt.year(),
        month: dt.month(),
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
        weekday: dt.weekday().num_days_from_sunday() as usize,
    };
    // The phantom leap day of the 1900 system. The bridge lands on Feb 28;
    // spreadsheets display serial 60 as Feb 29.
    if !date1904 && serial.trunc() as i64 == 60 {
        fields.month = 2;
        fields.day = 29;
    }
    fields
}

fn julian_to_datetime(part1: f64, part2: f64) -> NaiveDateTime {
    let mut days = part1.trunc() + part2.trunc();
    let mut fraction = part1.fract() + part2.fract();
    (days, fraction) = shift_julian_to_noon(days, fraction);
    let (mut hours, minutes, seconds, nanoseconds) = fraction_of_a_day(fraction);
    if hours >= 24 {
        hours -= 24;
        days += 1.0;
    }
    let (day, month, year) = gregorian_from_julian_day(days as i64);
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .expect("julian day maps to a valid date")
        .and_hms_nano_opt(hours, minutes, seconds, nanoseconds)
        .expect("day fraction maps to a valid time")
}

fn shift_julian_to_noon(mut julian_days: f64, mut julian_fraction: f64) -> (f64, f64) {
    if -0.5 < julian_fraction && julian_fraction < 0.5 {
        julian_fraction += 0.5;
    } else if julian_fraction >= 0.5 {
        julian_days += 1.0;
        julian_fraction -= 0.5;
    } else if julian_fraction <= -0.5 {
        julian_days -= 1.0;
        julian_fraction += 1.5;
    }
    (julian_days, julian_fraction)
}

/// Break a day fraction into clock components, rounded to 1 microsecond.
fn fraction_of_a_day(fraction: f64) -> (u32, u32, u32, u32) {
    const NANOS_PER_MICRO: i64 = 1_000;
    const NANOS_PER_SECOND: i64 = 1_000_000_000;
    const NANOS_PER_DAY: f64 = 86_400.0 * 1e9;

    let mut frac = (NANOS_PER_DAY * fraction + (NANOS_PER_MICRO / 2) as f64) as i64;
    let nanoseconds = ((frac % NANOS_PER_SECOND) / NANOS_PER_MICRO) * NANOS_PER_MICRO;
    frac /= NANOS_PER_SECOND;
    let seconds = frac % 60;
    frac /= 60;
    let minutes = frac % 60;
    let hours = frac / 60;
    (
        hours as u32,
        minutes as u32,
        seconds as u32,
        nanoseconds as u32,
    )
}

/// The Fliegel-Van Flandern integer algorithm (CACM 11(10), 1968): Julian
/// day number to (day, month, year) in the Gregorian calendar.
fn gregorian_from_julian_day(jd: i64) -> (i64, i64, i64) {
    let mut l = jd + 68569;
    let n = (4 * l) / 146097;
    l -= (146097 * n + 3) / 4;
    let i = (4000 * (l + 1)) / 1461001;
    l = l - (1461 * i) / 4 + 31;
    let j = (80 * l) / 2447;
    let d = l - (2447 * j) / 80;
    l = j / 11;
    let m = j + 2 - 12 * l;
    let y = 100 * (n - 49) + i + l;
    (d, m, y)
}

/// Render a serial date-time through a date format code.
///
/// The code is rewritten placeholder by placeholder, most-specific first and
/// first occurrence only, because `m` means month, minute, or part of a
/// month name depending on position. Month and weekday names are swapped in
/// through sigils that no other substitution can touch, and only resolved to
/// locale names at the very end.
pub(crate) fn render_serial_date(
    serial: f64,
    code: &str,
    locale: &Locale,
    date1904: bool,
) -> String {
    let dt = serial_date_time(serial, date1904);
    let mut out = code.to_string();

    // The presence of an am/pm marker selects the 12-hour clock, not the
    // number of `h` characters.
    let twelve_hour = ["am/pm", "AM/PM", "a/p", "A/P"]
        .iter()
        .any(|marker| code.contains(marker));
    let (padded_hour, bare_hour) = if twelve_hour {
        let h12 = match dt.hour % 12 {
            0 => 12,
            h => h,
        };
        (format!("{h12:02}"), format!("{h12}"))
    } else {
        // The 24-hour clock renders zero-padded for both `hh` and `h`.
        (format!("{:02}", dt.hour), format!("{:02}", dt.hour))
    };
    out = out.replacen("hh", &padded_hour, 1);
    out = out.replacen('h', &bare_hour, 1);

    let meridiem = if dt.hour < 12 { "AM" } else { "PM" }.to_string();
    let replacements: [(&str, String); 17] = [
        ("yyyy", format!("{:04}", dt.year)),
        ("yy", format!("{:02}", dt.year.rem_euclid(100))),
        ("mmmmm", "%%%%%".to_string()),
        ("mmmm", "%%%%".to_string()),
        ("mmm", "%%%".to_string()),
        ("dddd", "&&&&".to_string()),
        ("ddd", "&&&".to_string()),
        ("dd", format!("{:02}", dt.day)),
        ("d", format!("{}", dt.day)),
        ("mmss", format!("{:02}{:02}", dt.minute, dt.second)),
        ("ss", format!("{:02}", dt.second)),
        ("mm:", format!("{:02}:", dt.minute)),
        (":mm", format!(":{:02}", dt.minute)),
        ("mm", format!("{:02}", dt.month)),
        ("am/pm", meridiem.clone()),
        ("AM/PM", meridiem),
        ("m/", format!("{}/", dt.month)),
    ];
    for (placeholder, value) in &replacements {
        out = out.replacen(placeholder, value, 1);
    }
    out = out.replace("\\ ", " ");
    out = out.replace("\\,", ",");

    // Elapsed-hour constructs: dropped entirely (with a dangling colon) when
    // the hour is zero, unbracketed otherwise.
    let bracketed_padded = format!("[{padded_hour}]");
    let bracketed_bare = format!("[{bare_hour}]");
    if dt.hour < 1 {
        out = out.replacen("]:", "]", 1);
        out = out.replacen(&bracketed_padded, "", 1);
        out = out.replacen(&bracketed_bare, "", 1);
    } else {
        out = out.replacen(&bracketed_padded, &padded_hour, 1);
        out = out.replacen(&bracketed_bare, &bare_hour, 1);
    }

    let month = dt.month as usize;
    out = out.replace("%%%%%", locale.month_names_genitive[month]);
    out = out.replace("%%%%", locale.month_names[month]);
    out = out.replace("%%%", locale.month_abbr[month]);
    out = out.replace("&&&&", locale.weekday_names[dt.weekday]);
    out = out.replace("&&&", locale.weekday_abbr[dt.weekday]);
    out
}
