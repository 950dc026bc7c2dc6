use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Normalizes a free-form frontmatter date.
///
/// Tries ISO-style formats first (RFC 3339, RFC 2822, `YYYY-MM-DD`,
/// `Month D, YYYY`), then `Month Year` which resolves to the first day of
/// that month. Anything else yields `now`.
#[must_use]
pub fn normalize_date(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    parse_exact(raw)
        .or_else(|| parse_month_year(raw))
        .unwrap_or(now)
}

/// Formats a date as `Month Year`, the format new articles are stamped with.
#[must_use]
pub fn month_year(date: DateTime<Utc>) -> String {
    date.format("%B %Y").to_string()
}

fn parse_exact(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(midnight)
}

fn parse_month_year(raw: &str) -> Option<DateTime<Utc>> {
    let mut parts = raw.split_whitespace();
    let (month, year) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::parse_from_str(&format!("1 {month} {year}"), "%d %B %Y")
        .ok()
        .map(midnight)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
