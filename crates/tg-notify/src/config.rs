//! Notifier configuration.
//!
//! The configuration can be built in code, deserialized from a host's config
//! file, or read from environment variables:
//!
//! - `TG_NOTIFY_BOT_TOKEN`: Telegram bot token (required)
//! - `TG_NOTIFY_CHAT_ID`: destination chat id (required)
//! - `TG_NOTIFY_APP_NAME`: label shown in every message
//! - `TG_NOTIFY_PARSE_MODE`: `plain`, `markdown` or `html`
//! - `TG_NOTIFY_MAX_MESSAGE_LENGTH`: message size cap in characters
//! - `TG_NOTIFY_LOG_LEVEL`: level used when this crate installs logging
//! - `TG_NOTIFY_DISABLED`: set to "true" to keep everything log-only

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifierError;

const ENV_BOT_TOKEN: &str = "TG_NOTIFY_BOT_TOKEN";
const ENV_CHAT_ID: &str = "TG_NOTIFY_CHAT_ID";
const ENV_APP_NAME: &str = "TG_NOTIFY_APP_NAME";
const ENV_PARSE_MODE: &str = "TG_NOTIFY_PARSE_MODE";
const ENV_MAX_MESSAGE_LENGTH: &str = "TG_NOTIFY_MAX_MESSAGE_LENGTH";
const ENV_LOG_LEVEL: &str = "TG_NOTIFY_LOG_LEVEL";
const ENV_DISABLED: &str = "TG_NOTIFY_DISABLED";

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Telegram's own limit for a single text message.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4096;

/// Text formatting mode used when rendering and sending messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// No markup
    Plain,
    /// Telegram legacy Markdown
    #[default]
    Markdown,
    /// Telegram HTML subset
    Html,
}

impl ParseMode {
    /// Value of the `parse_mode` request field, if any.
    #[must_use]
    pub const fn api_value(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Markdown => Some("Markdown"),
            Self::Html => Some("HTML"),
        }
    }
}

impl FromStr for ParseMode {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "none" | "" => Ok(Self::Plain),
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(NotifierError::Configuration(format!(
                "unknown parse mode: {other}"
            ))),
        }
    }
}

/// Settings for the notifier and its Telegram transport.
#[derive(Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot token used to authenticate against the Bot API
    pub bot_token: String,

    /// Chat that receives every notification
    pub chat_id: String,

    /// Label shown in the message header
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Install a `tracing` subscriber when the notifier is created
    #[serde(default = "default_true")]
    pub logging_enabled: bool,

    /// Level for the installed subscriber (`RUST_LOG` wins when set)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub parse_mode: ParseMode,

    /// Hard kill-switch: when set, nothing is sent, only logged
    #[serde(default)]
    pub notifications_disabled: bool,

    /// Maximum number of characters per message
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// HTTP timeout applied by the Telegram client
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_app_name() -> String {
    "MyApp".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

const fn default_request_timeout_secs() -> u64 {
    10
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl NotifierConfig {
    /// Create a configuration with defaults for everything but the credentials.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            app_name: default_app_name(),
            logging_enabled: default_true(),
            log_level: default_log_level(),
            parse_mode: ParseMode::default(),
            notifications_disabled: false,
            max_message_length: default_max_message_length(),
            request_timeout_secs: default_request_timeout_secs(),
            api_base_url: default_api_base_url(),
        }
    }

    /// Read the configuration from `TG_NOTIFY_*` environment variables.
    ///
    /// Missing credentials are left empty so that `validate()` reports them.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Configuration`] when a variable is present but
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, NotifierError> {
        let mut config = Self::new(
            std::env::var(ENV_BOT_TOKEN).unwrap_or_default(),
            std::env::var(ENV_CHAT_ID).unwrap_or_default(),
        );

        if let Ok(app_name) = std::env::var(ENV_APP_NAME) {
            config.app_name = app_name;
        }
        if let Ok(mode) = std::env::var(ENV_PARSE_MODE) {
            config.parse_mode = mode.parse()?;
        }
        if let Ok(max) = std::env::var(ENV_MAX_MESSAGE_LENGTH) {
            config.max_message_length = max.trim().parse().map_err(|_| {
                NotifierError::Configuration(format!("{ENV_MAX_MESSAGE_LENGTH} is not a number: {max}"))
            })?;
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.notifications_disabled = std::env::var(ENV_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(config)
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub const fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    #[must_use]
    pub const fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    #[must_use]
    pub const fn with_notifications_disabled(mut self, disabled: bool) -> Self {
        self.notifications_disabled = disabled;
        self
    }

    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Check that the configuration can drive a notifier.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Configuration`] when the bot token or chat id
    /// is empty, the size cap is zero, or the log level is unknown.
    pub fn validate(&self) -> Result<(), NotifierError> {
        if self.bot_token.trim().is_empty() {
            return Err(NotifierError::Configuration(
                "bot_token is required".to_string(),
            ));
        }
        if self.chat_id.trim().is_empty() {
            return Err(NotifierError::Configuration(
                "chat_id is required".to_string(),
            ));
        }
        if self.max_message_length == 0 {
            return Err(NotifierError::Configuration(
                "max_message_length must be greater than zero".to_string(),
            ));
        }
        normalize_log_level(&self.log_level)?;
        Ok(())
    }
}

/// Map a configured level name onto a `tracing` level directive.
pub(crate) fn normalize_log_level(level: &str) -> Result<&'static str, NotifierError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        other => Err(NotifierError::Configuration(format!(
            "unknown log level: {other}"
        ))),
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("app_name", &self.app_name)
            .field("logging_enabled", &self.logging_enabled)
            .field("log_level", &self.log_level)
            .field("parse_mode", &self.parse_mode)
            .field("notifications_disabled", &self.notifications_disabled)
            .field("max_message_length", &self.max_message_length)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = NotifierConfig::new("T", "C");
        assert_eq!(config.app_name, "MyApp");
        assert_eq!(config.max_message_length, 4096);
        assert_eq!(config.parse_mode, ParseMode::Markdown);
        assert!(config.logging_enabled);
        assert!(!config.notifications_disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = NotifierConfig::new("", "C").validate().unwrap_err();
        assert_eq!(
            err,
            NotifierError::Configuration("bot_token is required".to_string())
        );

        let err = NotifierConfig::new("T", "  ").validate().unwrap_err();
        assert_eq!(
            err,
            NotifierError::Configuration("chat_id is required".to_string())
        );
    }

    #[test]
    fn test_log_level_aliases() {
        assert_eq!(normalize_log_level("WARNING").unwrap(), "warn");
        assert_eq!(normalize_log_level("Critical").unwrap(), "error");
        assert!(NotifierConfig::new("T", "C")
            .with_log_level("loud")
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: NotifierConfig =
            serde_json::from_str(r#"{"bot_token":"T","chat_id":"-100","parse_mode":"html"}"#)
                .unwrap();
        assert_eq!(config.parse_mode, ParseMode::Html);
        assert_eq!(config.app_name, "MyApp");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", NotifierConfig::new("123:secret", "C"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(ENV_BOT_TOKEN, "env-token");
        std::env::set_var(ENV_CHAT_ID, "42");
        std::env::set_var(ENV_PARSE_MODE, "plain");
        std::env::set_var(ENV_MAX_MESSAGE_LENGTH, "1000");
        std::env::set_var(ENV_DISABLED, "1");

        let config = NotifierConfig::from_env().unwrap();
        assert_eq!(config.bot_token, "env-token");
        assert_eq!(config.chat_id, "42");
        assert_eq!(config.parse_mode, ParseMode::Plain);
        assert_eq!(config.max_message_length, 1000);
        assert!(config.notifications_disabled);

        std::env::set_var(ENV_MAX_MESSAGE_LENGTH, "lots");
        assert!(NotifierConfig::from_env().is_err());

        for var in [
            ENV_BOT_TOKEN,
            ENV_CHAT_ID,
            ENV_PARSE_MODE,
            ENV_MAX_MESSAGE_LENGTH,
            ENV_DISABLED,
        ] {
            std::env::remove_var(var);
        }
    }
}
