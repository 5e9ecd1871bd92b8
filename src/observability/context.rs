//! Per-call log accumulator
//!
//! A [`LogContext`] is created by [`CallRunner`](super::runner::CallRunner)
//! for every call and handed to the call body. Message and value arguments
//! are closures: they run exactly once, at the moment the line is appended.
//!
//! ```ignore
//! runner.run("/users/get", |ctx| async move {
//!     ctx.log_info(|| "looking up user");
//!     ctx.log_data("Request", || format!("{:?}", request));
//!     Ok::<_, anyhow::Error>(())
//! }).await?;
//! ```

use super::clock::Clock;
use super::event::{LogEvent, LogLine, Severity};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Handle to one call's log lines
///
/// Clones share the same line list, so the context can be moved into
/// spawned work belonging to the same call. Lines appended after the call
/// finished are not persisted.
#[derive(Clone)]
pub struct LogContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    name: String,
    start_time: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    lines: Mutex<Vec<LogLine>>,
}

impl LogContext {
    /// Start a context for `name` (already sanitized) at `clock.now()`
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let start_time = clock.now();
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                start_time,
                clock,
                lines: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.inner.start_time
    }

    pub fn log_info<S: Into<String>>(&self, message: impl FnOnce() -> S) {
        self.message(Severity::Info, message);
    }

    pub fn log_warn<S: Into<String>>(&self, message: impl FnOnce() -> S) {
        self.message(Severity::Warn, message);
    }

    pub fn log_error<S: Into<String>>(&self, message: impl FnOnce() -> S) {
        self.message(Severity::Error, message);
    }

    /// Append a key/value detail
    pub fn log_data<V: fmt::Display>(&self, key: impl Into<String>, value: impl FnOnce() -> V) {
        let line = LogLine::Detail {
            key: key.into(),
            value: value().to_string(),
        };
        self.push(line);
    }

    /// Append an error entry for `error`
    ///
    /// The debug rendering is kept as the stack trace; for `anyhow::Error`
    /// that includes the cause chain and the backtrace when one was captured.
    pub fn log_exception<E, S>(&self, error: &E, message: impl FnOnce() -> S)
    where
        E: fmt::Display + fmt::Debug + ?Sized,
        S: Into<String>,
    {
        let message = message().into();
        self.record_error(message, error.to_string(), format!("{error:?}"));
    }

    pub(crate) fn record_error(&self, message: String, exception_message: String, stacktrace: String) {
        let line = LogLine::Error {
            message,
            time: self.inner.clock.now(),
            exception_message,
            stacktrace,
        };
        self.push(line);
    }

    /// Number of lines appended so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the call and take its lines
    ///
    /// `end_time` never precedes `start_time`, even if the clock went back.
    pub(crate) fn finish(&self) -> LogEvent {
        let logs = std::mem::take(&mut *self.lock());
        let end_time = self.inner.clock.now().max(self.inner.start_time);

        LogEvent {
            name: self.inner.name.clone(),
            start_time: self.inner.start_time,
            end_time,
            logs,
        }
    }

    fn message<S: Into<String>>(&self, severity: Severity, message: impl FnOnce() -> S) {
        // Evaluate outside the lock; the closure may log to this context itself.
        let text = message().into();
        let line = LogLine::Message {
            text,
            time: self.inner.clock.now(),
            severity,
        };
        self.push(line);
    }

    fn push(&self, line: LogLine) {
        self.lock().push(line);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogLine>> {
        self.inner.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("name", &self.inner.name)
            .field("start_time", &self.inner.start_time)
            .field("lines", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2023, 2, 18, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_lines_keep_call_order() {
        let clock = test_clock();
        let ctx = LogContext::new("amar", clock.clone());

        ctx.log_info(|| "Info Test");
        ctx.log_warn(|| "Warn Test".to_string());
        ctx.log_data("Foo", || "Bar");
        ctx.log_error(|| "Error Test");
        ctx.log_data("Count", || 3);

        let event = ctx.finish();
        assert_eq!(event.name, "amar");
        assert_eq!(event.logs.len(), 5);

        match &event.logs[0] {
            LogLine::Message { text, severity, .. } => {
                assert_eq!(text, "Info Test");
                assert_eq!(*severity, Severity::Info);
            }
            other => panic!("Expected message, got {:?}", other),
        }
        assert!(matches!(&event.logs[1], LogLine::Message { severity: Severity::Warn, .. }));
        assert_eq!(
            event.logs[2],
            LogLine::Detail {
                key: "Foo".to_string(),
                value: "Bar".to_string()
            }
        );
        assert!(event.logs[3].is_error());
        assert_eq!(
            event.logs[4],
            LogLine::Detail {
                key: "Count".to_string(),
                value: "3".to_string()
            }
        );
    }

    #[test]
    fn test_message_closure_runs_once_at_append() {
        let ctx = LogContext::new("lazy", test_clock());
        let calls = Cell::new(0);

        ctx.log_data("Expensive", || {
            calls.set(calls.get() + 1);
            "value"
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_closure_may_log_to_same_context() {
        let ctx = LogContext::new("nested", test_clock());
        let inner = ctx.clone();

        ctx.log_info(|| {
            inner.log_data("Inner", || "first");
            "outer"
        });

        let event = ctx.finish();
        assert_eq!(event.logs.len(), 2);
        assert!(matches!(&event.logs[0], LogLine::Detail { .. }));
    }

    #[test]
    fn test_log_exception_keeps_message_and_chain() {
        let ctx = LogContext::new("failing", test_clock());
        let error = anyhow::anyhow!("disk full").context("writing report");

        ctx.log_exception(&error, || "Report failed");

        match &ctx.finish().logs[0] {
            LogLine::Error {
                message,
                exception_message,
                stacktrace,
                ..
            } => {
                assert_eq!(message, "Report failed");
                assert_eq!(exception_message, "writing report");
                assert!(stacktrace.contains("disk full"));
            }
            other => panic!("Expected error entry, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_times() {
        let clock = test_clock();
        let ctx = LogContext::new("timed", clock.clone());
        let start = ctx.start_time();

        clock.advance(Duration::milliseconds(250));
        let event = ctx.finish();
        assert_eq!(event.start_time, start);
        assert_eq!(event.duration_ms(), 250);
    }

    #[test]
    fn test_end_time_never_before_start() {
        let clock = test_clock();
        let ctx = LogContext::new("skewed", clock.clone());

        clock.advance(Duration::seconds(-10));
        let event = ctx.finish();
        assert!(event.end_time >= event.start_time);
    }

    #[test]
    fn test_finish_drains_lines() {
        let ctx = LogContext::new("drain", test_clock());
        ctx.log_info(|| "once");

        assert_eq!(ctx.finish().logs.len(), 1);
        assert!(ctx.is_empty());
    }
}
