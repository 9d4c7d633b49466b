//! Notification event types: severities, categories and the notification record.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;

/// Severity levels for notifications, ordered by increasing urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Error - an operation failed
    Error,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Icon shown in front of the message header.
    #[must_use]
    pub const fn icon(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Error => "❌",
            Self::Critical => "🚨",
        }
    }

    /// Upper-case label used in the message header.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Whether a stack trace is captured and rendered at this severity.
    #[must_use]
    pub const fn includes_trace(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsystem an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Database,
    Telegram,
    Api,
    Cache,
    #[serde(rename = "authentication")]
    Auth,
    Schedule,
    System,
    Network,
    Validation,
    ExternalService,
}

impl Category {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Telegram => "telegram",
            Self::Api => "api",
            Self::Cache => "cache",
            Self::Auth => "authentication",
            Self::Schedule => "schedule",
            Self::System => "system",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::ExternalService => "external_service",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured key/value details attached to a notification.
///
/// Values are rendered with `Display` when inserted. Insertion order is kept
/// for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details(Vec<(String, String)>);

impl Details {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key/value pair, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a key/value pair. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        let key = key.into();
        let value = value.to_string();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: fmt::Display, const N: usize> From<[(K, V); N]> for Details {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |details, (k, v)| details.with(k, v))
    }
}

impl fmt::Display for Details {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// A single notification, built once and consumed once by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    severity: Severity,
    category: Category,
    message: String,
    details: Option<Details>,
    timestamp: DateTime<Local>,
    stack_trace: Option<String>,
}

impl Notification {
    /// Create a notification stamped with the current local time.
    #[must_use]
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            details: None,
            timestamp: Local::now(),
            stack_trace: None,
        }
    }

    /// Attach details. Empty details are dropped.
    #[must_use]
    pub fn with_details(mut self, details: Option<Details>) -> Self {
        self.details = details.filter(|d| !d.is_empty());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Capture the trace of `error`, if any, for severities that render traces.
    #[must_use]
    pub fn with_error(self, error: Option<&(dyn StdError + 'static)>) -> Self {
        match error {
            Some(err) if self.severity.includes_trace() => {
                let trace = capture_trace(err);
                self.with_stack_trace(trace)
            }
            _ => self,
        }
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn details(&self) -> Option<&Details> {
        self.details.as_ref()
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    #[must_use]
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

/// Render an error for display as a stack trace.
///
/// A backtrace comes first when `RUST_BACKTRACE` enables capturing, followed
/// by the error and one `Caused by:` line per source, so the tail of the
/// trace always names the failure.
#[must_use]
pub fn capture_trace(error: &(dyn StdError + 'static)) -> String {
    let mut trace = String::new();

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        trace.push_str(&backtrace.to_string());
        trace.push('\n');
    }

    trace.push_str(&error.to_string());
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\nCaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }

    trace
}
