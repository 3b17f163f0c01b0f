//! Field normalization: currency amounts and calendar dates.
//!
//! Pure functions. Unparseable input yields `None`, never an error.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    // Marker followed by a digit group: "PHP 1,000", "₱55,200.00", "Php 12.5"
    static ref CURRENCY_MARKED: Regex =
        Regex::new(r"(?i)(?:php|₱)\s*([\d,]+\.?\d*)").unwrap();

    static ref CURRENCY_BARE: Regex = Regex::new(r"([\d,]+\.?\d*)").unwrap();

    static ref TIME_OF_DAY: Regex =
        Regex::new(r"(?i)\s+\d{1,2}:\d{2}(?::\d{2})?\s*(?:AM|PM)?").unwrap();

    static ref DATE_YMD: Regex = Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap();
    static ref DATE_DMY_DASH: Regex = Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap();
    static ref DATE_SHORT_YEAR: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").unwrap();
    static ref DATE_SLASH: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap();
}

/// Two-digit years below this pivot land in the 2000s, the rest in the 1900s.
const YEAR_PIVOT: i32 = 50;

/// Parse a currency string into an amount.
///
/// Accepts a `PHP`/`₱` marker (any case, optional space) before the digits,
/// or a bare number. Thousands separators are dropped.
pub fn normalize_currency(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(cap) = CURRENCY_MARKED.captures(raw) {
        return parse_amount(&cap[1]);
    }

    let amount = CURRENCY_BARE
        .captures(raw)
        .and_then(|cap| parse_amount(&cap[1]));
    if amount.is_none() {
        debug!(value = %raw, "Could not parse currency");
    }
    amount
}

fn parse_amount(digits: &str) -> Option<f64> {
    digits.replace(',', "").parse::<f64>().ok()
}

/// Normalize a date string to `YYYY-MM-DD`.
///
/// Patterns are tried in order: canonical year-month-day, dashed
/// day-month-year, two-digit-year slash dates, then the ambiguous
/// four-digit-year slash form. For the latter, a first field above 12 is
/// the day (day-month-year), a second field above 12 is the day
/// (month-day-year), and otherwise day-month-year is tried first with
/// month-day-year as the fallback when the first reading is not a real
/// calendar date.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = TIME_OF_DAY.replace_all(trimmed, "");
    let value = value.trim();

    if let Some(cap) = DATE_YMD.captures(value) {
        if let Some(date) = ymd(&cap[1], &cap[2], &cap[3]) {
            return Some(date);
        }
    }

    if let Some(cap) = DATE_DMY_DASH.captures(value) {
        if let Some(date) = ymd(&cap[3], &cap[2], &cap[1]) {
            return Some(date);
        }
    }

    if let Some(cap) = DATE_SHORT_YEAR.captures(value) {
        let yy: i32 = cap[3].parse().ok()?;
        let century = if yy < YEAR_PIVOT { 2000 } else { 1900 };
        if let Some(date) = ymd(&(century + yy).to_string(), &cap[2], &cap[1]) {
            return Some(date);
        }
    }

    if let Some(cap) = DATE_SLASH.captures(value) {
        let first: u32 = cap[1].parse().ok()?;
        let second: u32 = cap[2].parse().ok()?;
        let year: i32 = cap[3].parse().ok()?;

        let result = if first > 12 {
            calendar_date(year, second, first)
        } else if second > 12 {
            calendar_date(year, first, second)
        } else {
            calendar_date(year, second, first).or_else(|| calendar_date(year, first, second))
        };
        if result.is_some() {
            return result;
        }
    }

    debug!(value = %raw, "Could not parse date");
    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<String> {
    calendar_date(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn calendar_date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}
