//! Date-expression parsing for the `created`, `last-visited`, and
//! `last-modified` actions.
//!
//! Converters are tried in a fixed order and the first one that
//! understands the text wins:
//!
//! 1. Absolute dates: `yyyy/mm/dd` (month and day may be one digit).
//! 2. Relative dates, resolved against a caller-supplied "today":
//!    `today`, `yesterday`, `N days ago`, `a week ago`, `last month`,
//!    and so on. Words may be separated by spaces, `-`, or `_`, so
//!    `3-days-ago` works without quoting.

use time::{Date, Duration, Month};

/// Attempts to turn text into a calendar date.
pub type DateConverter = fn(&str, Date) -> Option<Date>;

const CONVERTERS: [DateConverter; 2] = [parse_absolute, parse_relative];

/// Parse `text` with the first converter that accepts it.
pub fn parse_date_expression(text: &str, today: Date) -> Option<Date> {
    CONVERTERS
        .iter()
        .find_map(|converter| converter(text, today))
}

/// `yyyy/mm/dd`.
pub fn parse_absolute(text: &str, _today: Date) -> Option<Date> {
    let mut parts = text.trim().split('/');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let digits = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.chars().all(|c| c.is_ascii_digit())
    };
    if year.len() != 4 || !digits(year, 4) || !digits(month, 2) || !digits(day, 2) {
        return None;
    }

    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        match word.strip_suffix('s').unwrap_or(word) {
            "day" => Some(Unit::Day),
            "week" => Some(Unit::Week),
            "month" => Some(Unit::Month),
            "year" => Some(Unit::Year),
            _ => None,
        }
    }
}

/// Relative expressions such as `today` or `2 weeks ago`.
pub fn parse_relative(text: &str, today: Date) -> Option<Date> {
    let lowered = text.trim().to_ascii_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .collect();

    match words.as_slice() {
        ["today"] => Some(today),
        ["yesterday"] => today.previous_day(),
        ["last", unit] => shift_back(today, 1, Unit::parse(unit)?),
        [count, unit, "ago"] => {
            let count = match *count {
                "a" | "an" => 1,
                n => n.parse::<u32>().ok()?,
            };
            shift_back(today, count, Unit::parse(unit)?)
        }
        _ => None,
    }
}

fn shift_back(today: Date, count: u32, unit: Unit) -> Option<Date> {
    match unit {
        Unit::Day => today.checked_sub(Duration::days(i64::from(count))),
        Unit::Week => today.checked_sub(Duration::weeks(i64::from(count))),
        Unit::Month => months_back(today, count),
        Unit::Year => months_back(today, count.checked_mul(12)?),
    }
}

/// Move back whole calendar months, clamping the day to the length of
/// the target month (March 31 minus one month is February 28/29).
fn months_back(today: Date, months: u32) -> Option<Date> {
    let index = i64::from(today.year()) * 12 + i64::from(u8::from(today.month())) - 1
        - i64::from(months);
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = today.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}
