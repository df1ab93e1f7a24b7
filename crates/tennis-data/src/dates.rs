//! Match date parsing.
//!
//! Historical result files mix day-first (`03/01/2022`), ISO (`2022-01-03`)
//! and compact (`20220103`) dates. Anything else is treated as unparsable and
//! the row is excluded from the filtered history.

use chrono::NaiveDate;

/// Day-first and ISO formats, tried in order.
pub const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

/// Parses a match date, returning `None` for blank or unrecognised input.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    parse_compact(trimmed)
}

/// `YYYYMMDD`, optionally written as a float by spreadsheet exports (`20220103.0`).
fn parse_compact(raw: &str) -> Option<NaiveDate> {
    let digits = raw.strip_suffix(".0").unwrap_or(raw);
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = digits[..4].parse::<i32>().ok()?;
    let month = digits[4..6].parse::<u32>().ok()?;
    let day = digits[6..].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
