//! Structured logging for audit events.
//!
//! Every notable action (registration, login, follow changes, profile
//! updates) is reported as a [`LogEvent`]: a severity, a short message, and
//! a list of key/value fields.  Events are dispatched through a [`Logger`],
//! an injectable sink carried in application state rather than a global.
//! The default sink writes timestamped lines to stderr:
//!
//! ```text
//! 20260211T21:33:12.000 - INFO - user registered (username=alice, email=alice@example.com)
//! ```

use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

/// A single structured log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEvent {
    /// Render the event as a single log line (without timestamp).
    pub fn render(&self) -> String {
        if self.fields.is_empty() {
            format!("{} - {}", self.severity.as_str(), self.message)
        } else {
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!(
                "{} - {} ({})",
                self.severity.as_str(),
                self.message,
                fields.join(", ")
            )
        }
    }
}

/// Injectable event sink.  Cloning is cheap; all clones share one sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Fn(LogEvent) + Send + Sync>,
}

impl Logger {
    /// Build a logger with a custom sink (test capture, file writer, etc).
    pub fn new(sink: Arc<dyn Fn(LogEvent) + Send + Sync>) -> Self {
        Self { sink }
    }

    /// Default logger: timestamped lines on stderr.
    pub fn stderr() -> Self {
        Self::new(Arc::new(|event| {
            eprintln!("{} - {}", format_timestamp(), event.render());
        }))
    }

    /// Logger that drops every event.
    pub fn discard() -> Self {
        Self::new(Arc::new(|_| {}))
    }

    pub fn info(&self, message: &str, fields: &[(&'static str, &str)]) {
        self.emit(Severity::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: &[(&'static str, &str)]) {
        self.emit(Severity::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: &[(&'static str, &str)]) {
        self.emit(Severity::Error, message, fields);
    }

    fn emit(&self, severity: Severity, message: &str, fields: &[(&'static str, &str)]) {
        let event = LogEvent {
            severity,
            message: message.to_string(),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        };
        (self.sink)(event);
    }
}

/// Format the current wall-clock time as `YYYYMMDDTHH:MM:SS.mmm`.
pub fn format_timestamp() -> String {
    let now = SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    // Civil date from days since epoch (Howard Hinnant's algorithm).
    let days = (secs / 86400) as i64;
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}",
        y, m, d, hours, minutes, seconds, millis
    )
}
