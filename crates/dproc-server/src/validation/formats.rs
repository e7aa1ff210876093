//! Well-known string formats

use std::net::Ipv4Addr;

use chrono::{DateTime, NaiveDate, NaiveTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Date,
    DateTime,
    Time,
    Email,
    Uuid,
    Uri,
    Ipv4,
}

impl StringFormat {
    /// `None` for format names this validator does not check.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "date" => Some(StringFormat::Date),
            "date-time" => Some(StringFormat::DateTime),
            "time" => Some(StringFormat::Time),
            "email" => Some(StringFormat::Email),
            "uuid" => Some(StringFormat::Uuid),
            "uri" => Some(StringFormat::Uri),
            "ipv4" => Some(StringFormat::Ipv4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StringFormat::Date => "date",
            StringFormat::DateTime => "date-time",
            StringFormat::Time => "time",
            StringFormat::Email => "email",
            StringFormat::Uuid => "uuid",
            StringFormat::Uri => "uri",
            StringFormat::Ipv4 => "ipv4",
        }
    }

    pub fn matches(self, value: &str) -> bool {
        match self {
            StringFormat::Date => {
                value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
            },
            StringFormat::DateTime => DateTime::parse_from_rfc3339(value).is_ok(),
            StringFormat::Time => is_time(value),
            StringFormat::Email => is_email(value),
            StringFormat::Uuid => value.len() == 36 && uuid::Uuid::try_parse(value).is_ok(),
            StringFormat::Uri => is_uri(value),
            StringFormat::Ipv4 => value.parse::<Ipv4Addr>().is_ok(),
        }
    }
}

// HH:MM:SS[.fraction][Z|+hh:mm|-hh:mm]
fn is_time(value: &str) -> bool {
    let (clock, offset) = match value.find(['Z', 'z', '+', '-']) {
        Some(pos) => value.split_at(pos),
        None => (value, ""),
    };
    let bytes = clock.as_bytes();
    let clock_ok = bytes.len() >= 8
        && bytes[2] == b':'
        && bytes[5] == b':'
        && NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").is_ok();
    let offset_ok = match offset {
        "" | "Z" | "z" => true,
        tz => {
            let digits = &tz[1..];
            digits.len() == 5
                && NaiveTime::parse_from_str(&format!("{digits}:00"), "%H:%M:%S").is_ok()
        },
    };
    clock_ok && offset_ok
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

fn is_uri(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    scheme_ok && !rest.is_empty() && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dates() {
        assert!(StringFormat::Date.matches("2024-02-29"));
        assert!(!StringFormat::Date.matches("2023-02-29"));
        assert!(!StringFormat::Date.matches("2024-2-9"));
        assert!(StringFormat::DateTime.matches("2024-05-01T10:00:00Z"));
        assert!(StringFormat::DateTime.matches("2024-05-01T10:00:00.5+03:00"));
        assert!(!StringFormat::DateTime.matches("2024-05-01 10:00"));
    }

    #[test]
    fn test_times() {
        assert!(StringFormat::Time.matches("23:59:59"));
        assert!(StringFormat::Time.matches("08:00:00.250Z"));
        assert!(StringFormat::Time.matches("08:00:00+02:00"));
        assert!(!StringFormat::Time.matches("24:00:00"));
        assert!(!StringFormat::Time.matches("8:00"));
    }

    #[test]
    fn test_email_uuid_uri_ipv4() {
        assert!(StringFormat::Email.matches("dana@example.co.il"));
        assert!(!StringFormat::Email.matches("dana@@example.com"));
        assert!(!StringFormat::Email.matches("dana@localhost"));
        assert!(StringFormat::Uuid.matches("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!StringFormat::Uuid.matches("123e4567e89b12d3a456426614174000"));
        assert!(StringFormat::Uri.matches("https://example.com/a?b=c"));
        assert!(!StringFormat::Uri.matches("not a uri"));
        assert!(StringFormat::Ipv4.matches("10.0.0.1"));
        assert!(!StringFormat::Ipv4.matches("10.0.0.256"));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(StringFormat::from_name("hostname"), None);
        assert_eq!(StringFormat::from_name("date-time"), Some(StringFormat::DateTime));
    }
}
