//! HTTP dates as seconds since the unix epoch
//!
//! Parsing accepts the three formats allowed by RFC 2616 section 3.3.1 (RFC 1123,
//! RFC 850 and asctime). Well formed dates go through `httpdate`; anything else gets a
//! lenient second pass that tolerates a missing weekday and a missing `GMT`. Generation
//! always produces the RFC 1123 form.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

// 9999-12-31T23:59:59Z, the last instant with a four digit year
const MAX_SECONDS: u64 = 253_402_300_799;

/// Formats seconds since the epoch as an RFC 1123 date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_date(seconds: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(seconds.min(MAX_SECONDS)))
}

/// Parses any of the three HTTP date formats, `None` when the value is not a date
pub fn parse_date(value: &str) -> Option<u64> {
    if let Ok(time) = httpdate::parse_http_date(value.trim()) {
        return time.duration_since(UNIX_EPOCH).ok().map(|elapsed| elapsed.as_secs());
    }

    let parts = value.split_whitespace().collect::<Vec<_>>();
    let first = parts.first()?;

    let has_weekday = first.get(..3).is_some_and(|day| WEEKDAYS.contains(&day.to_ascii_lowercase().as_str()));
    if !has_weekday {
        let mut with_weekday = Vec::with_capacity(parts.len() + 1);
        with_weekday.push("sun,");
        with_weekday.extend_from_slice(&parts);
        if let Some(seconds) = parse_parts(&with_weekday) {
            return Some(seconds);
        }
    }

    parse_parts(&parts)
}

/// Seconds since the epoch for the current time
pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

fn parse_parts(parts: &[&str]) -> Option<u64> {
    let (day, month, year, time) = match parts.len() {
        // RFC 1123: Sun, 06 Nov 1994 08:49:37 GMT
        5 | 6 if parts[1].bytes().all(|b| b.is_ascii_digit()) => {
            (parts[1].parse().ok()?, month(parts[2])?, parts[3].parse().ok()?, parts[4])
        }
        // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
        3 | 4 if parts[1].contains('-') => {
            let mut date = parts[1].split('-');
            let day = date.next()?.parse().ok()?;
            let month = month(date.next()?)?;
            let year: i64 = date.next()?.parse().ok()?;
            if date.next().is_some() {
                return None;
            }
            let year = match year {
                0..69 => year + 2000,
                69..100 => year + 1900,
                _ => year,
            };
            (day, month, year, parts[2])
        }
        // asctime: Sun Nov  6 08:49:37 1994
        5 => (parts[2].parse().ok()?, month(parts[1])?, parts[4].parse().ok()?, parts[3]),
        _ => return None,
    };

    let mut time = time.split(':');
    let hour: u64 = time.next()?.parse().ok()?;
    let minute: u64 = time.next()?.parse().ok()?;
    let second: u64 = time.next()?.parse().ok()?;
    if time.next().is_some() {
        return None;
    }

    if !(1970..=9999).contains(&year) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    let days = u64::try_from(days_from_civil(year, month, day)).ok()?;
    Some(days * 86_400 + hour * 3_600 + minute * 60 + second)
}

fn month(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    let index = MONTHS.iter().position(|m| *m == name)?;
    u32::try_from(index + 1).ok()
}

// days since 1970-01-01 for a proleptic gregorian date
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let year_of_era = year - era * 400;
    let month_from_march = (i64::from(month) + 9) % 12;
    let day_of_year = (153 * month_from_march + 2) / 5 + i64::from(day) - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
