//! # Format Validators
//!
//! Named checks for the `format` keyword. Each validator reports its own
//! error kind; when several validators share a format name a string is
//! accepted if any of them accepts it, and every distinct kind is reported
//! otherwise.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ErrorKind;

/// A check bound to one `format` name.
pub trait FormatValidator: Send + Sync {
    /// The `format` keyword value this validator handles.
    fn format(&self) -> &str;

    /// The error reported when the check fails.
    fn error_kind(&self) -> ErrorKind;

    fn is_valid(&self, value: &str) -> bool;
}

/// The built-in validator set.
pub fn default_format_validators() -> Vec<Box<dyn FormatValidator>> {
    vec![
        Box::new(DateTimeFormat),
        Box::new(DateFormat),
        Box::new(TimeFormat),
        Box::new(GuidFormat { name: "uuid", kind: ErrorKind::UuidExpected }),
        Box::new(GuidFormat { name: "guid", kind: ErrorKind::GuidExpected }),
        Box::new(UriFormat),
        Box::new(EmailFormat),
        Box::new(HostnameFormat),
        Box::new(Ipv4Format),
        Box::new(Ipv6Format),
        Box::new(VersionFormat),
    ]
}

/// RFC 3339 timestamps.
pub struct DateTimeFormat;

impl FormatValidator for DateTimeFormat {
    fn format(&self) -> &str {
        "date-time"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::DateTimeExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        chrono::DateTime::parse_from_rfc3339(value).is_ok()
    }
}

/// Calendar dates (`YYYY-MM-DD`).
pub struct DateFormat;

impl FormatValidator for DateFormat {
    fn format(&self) -> &str {
        "date"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::DateExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
    }
}

/// Times of day with optional fraction and offset.
pub struct TimeFormat;

impl FormatValidator for TimeFormat {
    fn format(&self) -> &str {
        "time"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::TimeExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        let (time, offset) = split_time_offset(value);
        let time_ok = chrono::NaiveTime::parse_from_str(time, "%H:%M:%S%.f").is_ok()
            || chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").is_ok()
            || chrono::NaiveTime::parse_from_str(time, "%H:%M").is_ok();
        let offset_ok = match offset {
            None | Some("Z") | Some("z") => true,
            Some(offset) => chrono::NaiveTime::parse_from_str(&offset[1..], "%H:%M").is_ok(),
        };
        time_ok && offset_ok
    }
}

fn split_time_offset(value: &str) -> (&str, Option<&str>) {
    match value.find(|c| c == 'Z' || c == 'z' || c == '+' || c == '-') {
        Some(i) => (&value[..i], Some(&value[i..])),
        None => (value, None),
    }
}

/// UUIDs, under either format name.
pub struct GuidFormat {
    name: &'static str,
    kind: ErrorKind,
}

impl FormatValidator for GuidFormat {
    fn format(&self) -> &str {
        self.name
    }

    fn error_kind(&self) -> ErrorKind {
        self.kind
    }

    fn is_valid(&self, value: &str) -> bool {
        uuid::Uuid::parse_str(value).is_ok()
    }
}

/// Absolute URIs.
pub struct UriFormat;

impl FormatValidator for UriFormat {
    fn format(&self) -> &str {
        "uri"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::UriExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        url::Url::parse(value).is_ok()
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$").ok()
        })
        .as_ref()
}

fn hostname_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$").ok()
        })
        .as_ref()
}

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d+(?:\.\d+){1,3}$").ok())
        .as_ref()
}

pub struct EmailFormat;

impl FormatValidator for EmailFormat {
    fn format(&self) -> &str {
        "email"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::EmailExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        email_pattern().is_some_and(|p| p.is_match(value))
    }
}

pub struct HostnameFormat;

impl FormatValidator for HostnameFormat {
    fn format(&self) -> &str {
        "hostname"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::HostnameExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        value.len() <= 253 && hostname_pattern().is_some_and(|p| p.is_match(value))
    }
}

pub struct Ipv4Format;

impl FormatValidator for Ipv4Format {
    fn format(&self) -> &str {
        "ipv4"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::IpV4Expected
    }

    fn is_valid(&self, value: &str) -> bool {
        value.parse::<Ipv4Addr>().is_ok()
    }
}

pub struct Ipv6Format;

impl FormatValidator for Ipv6Format {
    fn format(&self) -> &str {
        "ipv6"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::IpV6Expected
    }

    fn is_valid(&self, value: &str) -> bool {
        value.parse::<Ipv6Addr>().is_ok()
    }
}

/// Dotted numeric versions with two to four components.
pub struct VersionFormat;

impl FormatValidator for VersionFormat {
    fn format(&self) -> &str {
        "version"
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::VersionExpected
    }

    fn is_valid(&self, value: &str) -> bool {
        version_pattern().is_some_and(|p| p.is_match(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_time() {
        assert!(DateTimeFormat.is_valid("2024-01-15T10:30:00Z"));
        assert!(DateTimeFormat.is_valid("2024-01-15T10:30:00.5+02:00"));
        assert!(!DateTimeFormat.is_valid("2024-01-15"));
    }

    #[test]
    fn test_date_and_time() {
        assert!(DateFormat.is_valid("2024-02-29"));
        assert!(!DateFormat.is_valid("2023-02-29"));
        assert!(TimeFormat.is_valid("10:30:00"));
        assert!(TimeFormat.is_valid("10:30:00.250Z"));
        assert!(TimeFormat.is_valid("10:30:00+01:00"));
        assert!(!TimeFormat.is_valid("25:00:00"));
    }

    #[test]
    fn test_uuid() {
        let v = GuidFormat { name: "uuid", kind: ErrorKind::UuidExpected };
        assert!(v.is_valid("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!v.is_valid("not-a-uuid"));
    }

    #[test]
    fn test_uri_email_hostname() {
        assert!(UriFormat.is_valid("file:///var/lib/data.json"));
        assert!(!UriFormat.is_valid("relative/path"));
        assert!(EmailFormat.is_valid("user@example.com"));
        assert!(!EmailFormat.is_valid("user@"));
        assert!(HostnameFormat.is_valid("media-server.local"));
        assert!(!HostnameFormat.is_valid("-bad.example"));
    }

    #[test]
    fn test_ip_and_version() {
        assert!(Ipv4Format.is_valid("192.168.1.10"));
        assert!(!Ipv4Format.is_valid("256.1.1.1"));
        assert!(Ipv6Format.is_valid("::1"));
        assert!(VersionFormat.is_valid("1.2.3"));
        assert!(VersionFormat.is_valid("5.0.0.1"));
        assert!(!VersionFormat.is_valid("1"));
    }

    #[test]
    fn test_default_set_covers_names() {
        let names: Vec<String> = default_format_validators()
            .iter()
            .map(|v| v.format().to_string())
            .collect();
        for expected in ["date-time", "date", "time", "uuid", "guid", "uri", "email", "hostname", "ipv4", "ipv6", "version"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }
}
