//! Formats notifications and hands them to the configured channel.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::channels::telegram::TelegramChannel;
use crate::channels::NotifyChannel;
use crate::config::{NotifierConfig, ParseMode};
use crate::events::{Category, Details, Notification, Severity};
use crate::logging::init_logging;

/// Appended to messages cut down to `max_message_length`.
pub const TRUNCATION_SUFFIX: &str = "\n\n... (message truncated)";

/// Number of trailing stack trace lines included in a message.
pub const TRACE_PREVIEW_LINES: usize = 5;

/// Borrowed error accepted by the notify entry points.
pub type ErrorRef<'a> = &'a (dyn StdError + Send + Sync + 'static);

/// What happened to a notification after it was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The channel accepted the message
    Delivered,
    /// Only the local log line was written
    LogOnly,
    /// The channel rejected the message or could not be reached
    Failed,
}

/// Owns the channel and turns notifications into chat messages.
///
/// Delivery is best-effort: every notification is logged locally first, and
/// channel failures are logged instead of returned.
pub struct Notifier {
    config: NotifierConfig,
    channel: RwLock<Option<Arc<dyn NotifyChannel>>>,
}

impl Notifier {
    /// Create a notifier sending through the Telegram Bot API.
    ///
    /// Never fails: when notifications are disabled, the credentials are
    /// incomplete or the client cannot be built, the notifier is log-only.
    #[must_use]
    pub fn new(config: NotifierConfig) -> Self {
        init_logging(&config);

        let channel: Option<Arc<dyn NotifyChannel>> = if config.notifications_disabled {
            warn!("Telegram notifications disabled, falling back to log-only mode");
            None
        } else if config.bot_token.trim().is_empty() || config.chat_id.trim().is_empty() {
            warn!("Bot token or chat id not configured, falling back to log-only mode");
            None
        } else {
            match TelegramChannel::from_config(&config) {
                Ok(channel) => {
                    info!("Telegram notification channel initialized");
                    Some(Arc::new(channel))
                }
                Err(e) => {
                    error!(error = %e, "Failed to initialize Telegram channel");
                    None
                }
            }
        };

        Self {
            config,
            channel: RwLock::new(channel),
        }
    }

    /// Create a notifier with a specific channel.
    #[must_use]
    pub fn with_channel(config: NotifierConfig, channel: Arc<dyn NotifyChannel>) -> Self {
        init_logging(&config);
        debug!(channel = channel.name(), "Notifier created with custom channel");
        Self {
            config,
            channel: RwLock::new(Some(channel)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Check if a live channel is attached.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel().is_some()
    }

    fn channel(&self) -> Option<Arc<dyn NotifyChannel>> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log a notification locally and, if possible, deliver it.
    pub async fn send(&self, notification: Notification) -> DeliveryOutcome {
        log_notification(&notification);

        if self.config.notifications_disabled || self.config.chat_id.trim().is_empty() {
            return DeliveryOutcome::LogOnly;
        }
        let Some(channel) = self.channel() else {
            return DeliveryOutcome::LogOnly;
        };

        let text = fit_segments(
            &self.segments(&notification),
            self.config.parse_mode,
            self.config.max_message_length,
        );

        match channel
            .send_text(&self.config.chat_id, &text, self.config.parse_mode)
            .await
        {
            Ok(()) => {
                debug!(channel = channel.name(), "Notification sent");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    channel = channel.name(),
                    error = %e,
                    "Failed to send notification"
                );
                DeliveryOutcome::Failed
            }
        }
    }

    /// Render a notification as message text, without truncation.
    #[must_use]
    pub fn format_message(&self, notification: &Notification) -> String {
        let mode = self.config.parse_mode;
        let mut text = String::new();
        for segment in self.segments(notification) {
            segment.render_into(mode, &mut text);
        }
        text
    }

    /// Lay out a notification as segments, keeping markup apart from content.
    fn segments(&self, notification: &Notification) -> Vec<Segment> {
        let severity = notification.severity();
        let mut segments = vec![
            Segment::Text(format!("{} ", severity.icon())),
            Segment::Bold(format!("{} - {}", self.config.app_name, severity.label())),
            Segment::Text("\n".to_string()),
            Segment::Bold("Category:".to_string()),
            Segment::Text(format!(" {}\n", notification.category())),
            Segment::Bold("Message:".to_string()),
            Segment::Text(format!(" {}", notification.message())),
        ];

        if let Some(details) = notification.details() {
            segments.push(Segment::Text("\n".to_string()));
            segments.push(Segment::Bold("Details:".to_string()));
            let mut lines = String::new();
            for (key, value) in details.iter() {
                let _ = write!(lines, "\n  - {key}: {value}");
            }
            segments.push(Segment::Text(lines));
        }

        segments.push(Segment::Text("\n".to_string()));
        segments.push(Segment::Bold("Time:".to_string()));
        segments.push(Segment::Text(format!(
            " {}",
            notification.timestamp().format("%Y-%m-%d %H:%M:%S")
        )));

        if severity.includes_trace() {
            if let Some(trace) = notification.stack_trace().filter(|t| !t.trim().is_empty()) {
                let all: Vec<&str> = trace.lines().collect();
                let preview = all[all.len().saturating_sub(TRACE_PREVIEW_LINES)..].join("\n");
                segments.push(Segment::Text("\n".to_string()));
                segments.push(Segment::Bold("Traceback:".to_string()));
                segments.push(Segment::Text("\n".to_string()));
                segments.push(Segment::Code(preview));
            }
        }

        segments
    }

    async fn notify(
        &self,
        severity: Severity,
        category: Category,
        message: String,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        let notification = Notification::new(severity, category, message)
            .with_details(details)
            .with_error(error.map(|e| e as &(dyn StdError + 'static)));
        self.send(notification).await
    }

    /// Informational notification.
    pub async fn info(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Info, category, message.into(), details, error)
            .await
    }

    pub async fn warning(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Warning, category, message.into(), details, error)
            .await
    }

    /// Error notification; a supplied error contributes its trace.
    pub async fn error(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Error, category, message.into(), details, error)
            .await
    }

    pub async fn critical(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Critical, category, message.into(), details, error)
            .await
    }

    /// Release the channel. Safe to call repeatedly, or with no channel.
    pub async fn close(&self) {
        let channel = self
            .channel
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(channel) = channel {
            channel.close().await;
            info!(channel = channel.name(), "Notification channel closed");
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .field("channel", &self.channel().map(|c| c.name()))
            .finish()
    }
}

/// Local log line for a notification: `[category] message | Details: {...}`.
#[must_use]
pub fn log_line(notification: &Notification) -> String {
    let mut line = format!("[{}] {}", notification.category(), notification.message());
    if let Some(details) = notification.details() {
        let _ = write!(line, " | Details: {details}");
    }
    line
}

/// Write the severity-mapped local log line for a notification.
pub(crate) fn log_notification(notification: &Notification) {
    let line = log_line(notification);
    match notification.severity() {
        Severity::Info => info!(category = %notification.category(), "{line}"),
        Severity::Warning => warn!(category = %notification.category(), "{line}"),
        Severity::Error => error!(category = %notification.category(), "{line}"),
        Severity::Critical => {
            error!(category = %notification.category(), critical = true, "{line}");
        }
    }
}

/// Cut `text` so that it never exceeds `max_length` characters.
///
/// Oversized text keeps its head and ends with [`TRUNCATION_SUFFIX`]; the
/// result is exactly `max_length` characters long.
#[must_use]
pub fn truncate_message(text: String, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text;
    }
    fit_segments(&[Segment::Text(text)], ParseMode::Plain, max_length)
}

/// A run of message content and the markup wrapped around it.
///
/// Content is stored unescaped. Escaping and markers are applied per mode,
/// so a cut never splits an escape sequence or leaves an entity open.
#[derive(Debug)]
enum Segment {
    Text(String),
    Bold(String),
    Code(String),
}

impl Segment {
    fn markers(&self, mode: ParseMode) -> (&'static str, &'static str) {
        match (self, mode) {
            (Self::Text(_), _) | (_, ParseMode::Plain) => ("", ""),
            (Self::Bold(_), ParseMode::Markdown) => ("*", "*"),
            (Self::Bold(_), ParseMode::Html) => ("<b>", "</b>"),
            (Self::Code(_), ParseMode::Markdown) => ("```\n", "\n```"),
            (Self::Code(_), ParseMode::Html) => ("<pre>", "</pre>"),
        }
    }

    /// Escaped content, one unit per source character.
    fn units(&self, mode: ParseMode) -> impl Iterator<Item = Cow<'static, str>> + '_ {
        // Legacy Markdown has no escapes inside an entity.
        let (body, markdown_escapes) = match self {
            Self::Text(body) => (body, true),
            Self::Bold(body) | Self::Code(body) => (body, false),
        };
        body.chars()
            .map(move |c| escape_char(mode, markdown_escapes, c))
    }

    fn render_into(&self, mode: ParseMode, out: &mut String) {
        let (open, close) = self.markers(mode);
        out.push_str(open);
        for unit in self.units(mode) {
            out.push_str(&unit);
        }
        out.push_str(close);
    }
}

fn escape_char(mode: ParseMode, markdown_escapes: bool, c: char) -> Cow<'static, str> {
    match (mode, c) {
        (ParseMode::Html, '&') => Cow::Borrowed("&amp;"),
        (ParseMode::Html, '<') => Cow::Borrowed("&lt;"),
        (ParseMode::Html, '>') => Cow::Borrowed("&gt;"),
        (ParseMode::Markdown, '_' | '*' | '`' | '[') if markdown_escapes => {
            Cow::Owned(format!("\\{c}"))
        }
        _ => Cow::Owned(c.to_string()),
    }
}

/// Render segments, cutting them down to exactly `max_length` characters
/// when they do not fit.
///
/// Every entity that is started is also closed. Room left by a unit or an
/// entity that cannot fit is padded with spaces before the suffix.
fn fit_segments(segments: &[Segment], mode: ParseMode, max_length: usize) -> String {
    let mut full = String::new();
    for segment in segments {
        segment.render_into(mode, &mut full);
    }
    if full.chars().count() <= max_length {
        return full;
    }

    let suffix_len = TRUNCATION_SUFFIX.chars().count();
    if max_length <= suffix_len {
        return TRUNCATION_SUFFIX.chars().take(max_length).collect();
    }

    let mut budget = max_length - suffix_len;
    let mut out = String::new();
    for segment in segments {
        let (open, close) = segment.markers(mode);
        let overhead = open.chars().count() + close.chars().count();
        if budget <= overhead {
            break;
        }

        let mut room = budget - overhead;
        let mut body = String::new();
        let mut complete = true;
        for unit in segment.units(mode) {
            let len = unit.chars().count();
            if len > room {
                complete = false;
                break;
            }
            body.push_str(&unit);
            room -= len;
        }

        if body.is_empty() && overhead > 0 {
            break;
        }
        out.push_str(open);
        out.push_str(&body);
        out.push_str(close);
        budget = room;

        if !complete {
            break;
        }
    }

    out.push_str(&" ".repeat(budget));
    out.push_str(TRUNCATION_SUFFIX);
    out
}
