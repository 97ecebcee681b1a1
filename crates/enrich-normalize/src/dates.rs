//! EU-style date extraction, grounded on the original implementation's
//! `common/norm/dates.py`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<day>\d{1,2})[./-](?P<month>\d{1,2})[./-](?P<year>\d{2,4})").unwrap());

/// Parse the first `dd[./-]mm[./-]yyyy` date found in `text`, day-first
/// (EU) interpretation. A two-digit year is treated as `2000 + year`.
/// Returns `None` if no date-shaped token is found, or the numbers do
/// not form a valid calendar date.
#[must_use]
pub fn parse_date_eu(text: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(text)?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;
    let month: u32 = caps.name("month")?.as_str().parse().ok()?;
    let mut year: i32 = caps.name("year")?.as_str().parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_first_with_two_digit_year() {
        assert_eq!(
            parse_date_eu("delivered on 05/03/24"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn invalid_calendar_date_is_none() {
        assert_eq!(parse_date_eu("on 31/02/2024 it broke"), None);
    }

    #[test]
    fn spec_example_slash_separated_full_year() {
        assert_eq!(parse_date_eu("01/02/2025"), NaiveDate::from_ymd_opt(2025, 2, 1));
    }

    #[test]
    fn spec_example_dash_separated_two_digit_year() {
        assert_eq!(parse_date_eu("31-12-24"), NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn spec_example_invalid_month() {
        assert_eq!(parse_date_eu("31/13/2025"), None);
    }

    #[test]
    fn no_date_present_is_none() {
        assert_eq!(parse_date_eu("no date here"), None);
    }
}
