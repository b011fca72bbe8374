//! `format` checks for string scalars.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::ir::Format;

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid regex")
});

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

static BASE64: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$")
        .expect("valid regex")
});

/// Whether `value` satisfies `format`. Custom formats always pass.
pub fn check_format(format: &Format, value: &str) -> bool {
    match format {
        Format::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        Format::DateTime => DateTime::parse_from_rfc3339(value).is_ok(),
        Format::Uuid => UUID.is_match(value),
        Format::Email => EMAIL.is_match(value),
        Format::Byte => BASE64.is_match(value),
        Format::Custom(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_and_date_time() {
        assert!(check_format(&Format::Date, "2024-02-29"));
        assert!(!check_format(&Format::Date, "2023-02-29"));
        assert!(check_format(&Format::DateTime, "2024-01-02T03:04:05Z"));
        assert!(check_format(&Format::DateTime, "2024-01-02T03:04:05.123+02:00"));
        assert!(!check_format(&Format::DateTime, "2024-01-02"));
    }

    #[test]
    fn test_regex_formats() {
        assert!(check_format(&Format::Uuid, "123e4567-e89b-12d3-a456-426614174000"));
        assert!(!check_format(&Format::Uuid, "123e4567"));
        assert!(check_format(&Format::Email, "a@example.com"));
        assert!(!check_format(&Format::Email, "not-an-email"));
        assert!(check_format(&Format::Byte, "aGVsbG8="));
        assert!(!check_format(&Format::Byte, "a"));
    }

    #[test]
    fn test_custom_formats_pass() {
        assert!(check_format(&Format::Custom("int64".into()), "anything"));
    }
}
