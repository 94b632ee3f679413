use chrono::{Duration, Local, NaiveDate};

/// Cuts long text for log lines without splitting a UTF-8 character.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Runs default to the previous day's feed.
pub fn yesterday() -> NaiveDate {
    Local::now().date_naive() - Duration::days(1)
}

pub fn parse_run_date(value: Option<&str>) -> Result<NaiveDate, chrono::ParseError> {
    match value {
        Some(v) => NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d"),
        None => Ok(yesterday()),
    }
}
