pub mod auth;
pub mod chat;
pub mod content;
pub mod cycles;
pub mod favorites;
pub mod symptoms;

use chrono::{Local, NaiveDate};

use crate::error::{AppError, AppResult};

/// Today in the user's local time zone
pub(crate) fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` date. A full ISO timestamp is accepted and truncated to its date.
pub(crate) fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
  let value = value.trim();
  if value.is_empty() {
    return Err(AppError::validation(format!("{} is required", field)));
  }

  let date_part = value.split('T').next().unwrap_or(value);
  NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
    AppError::validation(format!("{} must be a date in YYYY-MM-DD format, got '{}'", field, value))
  })
}

/// Trimmed filter value; absent or blank means no filter
pub(crate) fn non_blank_filter(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Like `non_blank_filter`, with "all" also meaning no filter
pub(crate) fn normalize_filter(value: Option<String>) -> Option<String> {
  non_blank_filter(value).filter(|v| v != crate::storage::ALL_FILTER)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_date_formats() {
    let expected = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    assert_eq!(parse_date("Start date", "2025-03-01").unwrap(), expected);
    assert_eq!(parse_date("Start date", " 2025-03-01T00:00:00.000Z ").unwrap(), expected);
  }

  #[test]
  fn test_parse_date_errors() {
    match parse_date("Start date", "") {
      Err(AppError::Validation(message)) => assert_eq!(message, "Start date is required"),
      other => panic!("unexpected: {:?}", other),
    }
    assert!(parse_date("Start date", "2025-02-30").is_err());
    assert!(parse_date("Start date", "March 1").is_err());
  }

  #[test]
  fn test_normalize_filter() {
    assert_eq!(normalize_filter(None), None);
    assert_eq!(normalize_filter(Some("all".into())), None);
    assert_eq!(normalize_filter(Some("  ".into())), None);
    assert_eq!(normalize_filter(Some(" sleep ".into())), Some("sleep".to_string()));

    assert_eq!(non_blank_filter(Some(" ".into())), None);
    assert_eq!(non_blank_filter(Some("all".into())), Some("all".to_string()));
  }
}
