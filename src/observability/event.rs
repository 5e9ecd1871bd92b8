//! Persisted call records and their log lines
//!
//! A [`LogEvent`] is one finished call: its endpoint name, the time window it
//! ran in, and the ordered [`LogLine`]s appended while it ran. Events are
//! immutable once built; the store never updates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a plain message line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// One line of a call's log
///
/// Serialized as an internally tagged union:
///
/// ```json
/// {"type": "message", "text": "cache miss", "time": 1676755225068, "severity": "Warn"}
/// {"type": "detail", "key": "user", "value": "42"}
/// {"type": "error", "message": "...", "time": 1676755225071, "exceptionMessage": "...", "stacktrace": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LogLine {
    Message {
        text: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        time: DateTime<Utc>,
        severity: Severity,
    },
    Detail {
        key: String,
        value: String,
    },
    Error {
        message: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        time: DateTime<Utc>,
        exception_message: String,
        stacktrace: String,
    },
}

impl LogLine {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            LogLine::Error { .. }
                | LogLine::Message {
                    severity: Severity::Error,
                    ..
                }
        )
    }
}

/// A finished call, as stored and as returned by the query API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    pub logs: Vec<LogLine>,
}

impl LogEvent {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}

/// Calendar day filter, always interpreted in UTC
///
/// The wire form keeps the field order `{day, month, year}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl Day {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { day, month, year }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self::new(date.year(), date.month(), date.day())
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Closed `[00:00:00.000, 23:59:59.999]` UTC interval in Unix milliseconds
    ///
    /// Returns `None` for dates that don't exist on the calendar.
    pub fn bounds_millis(&self) -> Option<(i64, i64)> {
        let date = self.to_date()?;
        let start = date.and_hms_milli_opt(0, 0, 0, 0)?.and_utc();
        let end = date.and_hms_milli_opt(23, 59, 59, 999)?.and_utc();
        Some((start.timestamp_millis(), end.timestamp_millis()))
    }
}

/// Turn a call name into the endpoint key events are grouped by
///
/// `"/api/users"` becomes `"api_users"`; only one leading `/` is dropped.
pub fn endpoint_name(call_name: &str) -> String {
    call_name
        .strip_prefix('/')
        .unwrap_or(call_name)
        .replace('/', "_")
}
