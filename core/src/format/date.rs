//! Date values whose wire form follows the active codec configuration.
//!
//! `Timestamp` wraps a UTC `DateTime` and serializes through whichever
//! `DateFormat` the enclosing codec installed for the current thread. The
//! JSON codec scopes its configured format around each encode and decode
//! call; outside such a scope ISO-8601 applies.

use std::cell::RefCell;
use std::fmt::{self, Write};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};

/// How dates are rendered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// RFC 3339 / ISO-8601 with a `Z` suffix, e.g. `1970-08-21T10:53:52Z`.
    #[default]
    Iso8601,
    /// A `chrono` strftime pattern such as `%Y-%m-%d %H:%M:%S`.
    Custom(String),
}

impl DateFormat {
    pub fn custom(pattern: impl Into<String>) -> Self {
        DateFormat::Custom(pattern.into())
    }

    fn render(&self, value: &DateTime<Utc>) -> Result<String, fmt::Error> {
        match self {
            DateFormat::Iso8601 => Ok(value.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            DateFormat::Custom(pattern) => {
                let mut out = String::new();
                write!(out, "{}", value.format(pattern))?;
                Ok(out)
            }
        }
    }

    fn parse(&self, text: &str) -> Result<DateTime<Utc>, String> {
        match self {
            DateFormat::Iso8601 => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("expected ISO-8601 date, got `{text}`: {e}")),
            DateFormat::Custom(pattern) => {
                if let Ok(dt) = DateTime::parse_from_str(text, pattern) {
                    return Ok(dt.with_timezone(&Utc));
                }
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
                    return Ok(naive.and_utc());
                }
                NaiveDate::parse_from_str(text, pattern)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
                    .ok_or_else(|| format!("date `{text}` does not match pattern `{pattern}`"))
            }
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<DateFormat> = RefCell::new(DateFormat::Iso8601);
}

struct Restore(Option<DateFormat>);

impl Drop for Restore {
    fn drop(&mut self) {
        if let Some(previous) = self.0.take() {
            ACTIVE.with(|active| *active.borrow_mut() = previous);
        }
    }
}

/// Runs `f` with `format` installed as the thread's active date format.
pub(crate) fn with_date_format<R>(format: &DateFormat, f: impl FnOnce() -> R) -> R {
    let previous = ACTIVE.with(|active| active.replace(format.clone()));
    let _restore = Restore(Some(previous));
    f()
}

fn active() -> DateFormat {
    ACTIVE.with(|active| active.borrow().clone())
}

/// A UTC instant serialized with the active `DateFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn from_unix(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(Timestamp)
    }

    pub fn now() -> Self {
        Timestamp(Utc::now())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let format = active();
        let text = format
            .render(&self.0)
            .map_err(|_| <S::Error as ser::Error>::custom(format!("invalid date format {format:?}")))?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a date string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                active().parse(v).map(Timestamp).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TimestampVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Timestamp {
        Timestamp::from_unix(1984 * 10123).unwrap()
    }

    #[test]
    fn iso8601_is_the_default() {
        assert_eq!(serde_json::to_string(&sample()).unwrap(), "\"1970-08-21T10:53:52Z\"");
        let parsed: Timestamp = serde_json::from_str("\"1970-08-21T10:53:52Z\"").unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn custom_format_applies_inside_scope_only() {
        let format = DateFormat::custom("%Y-%m-%d %H:%M:%S");
        let json = with_date_format(&format, || serde_json::to_string(&sample()).unwrap());
        assert_eq!(json, "\"1970-08-21 10:53:52\"");
        assert_eq!(serde_json::to_string(&sample()).unwrap(), "\"1970-08-21T10:53:52Z\"");
    }

    #[test]
    fn custom_date_only_pattern_parses_midnight() {
        let format = DateFormat::custom("%d/%m/%Y");
        let parsed: Timestamp = with_date_format(&format, || serde_json::from_str("\"21/08/1970\"").unwrap());
        assert_eq!(parsed, Timestamp::from_unix(232 * 86_400).unwrap());
    }

    #[test]
    fn mismatched_text_is_rejected() {
        let result: Result<Timestamp, _> = serde_json::from_str("\"yesterday\"");
        assert!(result.is_err());
    }

    #[test]
    fn scope_restores_previous_format_when_nested() {
        let outer = DateFormat::custom("%Y");
        let inner = DateFormat::custom("%m");
        let (inner_text, outer_text) = with_date_format(&outer, || {
            let inner_text = with_date_format(&inner, || serde_json::to_string(&sample()).unwrap());
            (inner_text, serde_json::to_string(&sample()).unwrap())
        });
        assert_eq!(inner_text, "\"08\"");
        assert_eq!(outer_text, "\"1970\"");
    }
}
