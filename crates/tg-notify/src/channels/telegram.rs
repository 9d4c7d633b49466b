//! Telegram Bot API notification channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{NotifierConfig, ParseMode};
use crate::error::ChannelError;
use crate::NotifyChannel;

/// Telegram channel sending through `sendMessage`.
pub struct TelegramChannel {
    bot_token: String,
    base_url: String,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl TelegramChannel {
    /// Create a Telegram channel from the notifier configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConfigured`] when the token is empty and
    /// [`ChannelError::Http`] when the HTTP client cannot be built.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("bot_token".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            bot_token: config.bot_token.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let payload = SendMessageRequest {
            chat_id,
            text,
            parse_mode: parse_mode.api_value(),
        };

        debug!(channel = "telegram", chars = text.chars().count(), "Sending message");

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = match serde_json::from_str::<ApiResponse>(&body) {
            Ok(parsed) => Some(parsed),
            Err(e) if status.is_success() => {
                warn!(channel = "telegram", error = %e, "Unreadable sendMessage response");
                return Err(e.into());
            }
            Err(_) => None,
        };

        if status.is_success() && parsed.as_ref().is_some_and(|r| r.ok) {
            debug!(channel = "telegram", "Message sent successfully");
            return Ok(());
        }

        let description = parsed
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or(body);

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = parsed
                .and_then(|r| r.parameters)
                .and_then(|p| p.retry_after)
                .unwrap_or(0);
            return Err(ChannelError::RateLimited { retry_after_secs });
        }

        warn!(
            channel = "telegram",
            status = %status,
            description = %description,
            "Telegram sendMessage request failed"
        );

        Err(ChannelError::Api {
            code: status.as_u16(),
            description,
        })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(channel = "telegram", "Channel closed");
        }
    }
}

// =============================================================================
// Telegram API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = NotifierConfig::new("123:abc", "C").with_api_base_url("http://localhost:9/");
        let channel = TelegramChannel::from_config(&config).unwrap();
        assert_eq!(channel.endpoint(), "http://localhost:9/bot123:abc/sendMessage");
    }

    #[test]
    fn test_empty_token_is_not_configured() {
        let config = NotifierConfig::new("", "C");
        assert!(matches!(
            TelegramChannel::from_config(&config),
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_plain_mode_omits_parse_mode() {
        let payload = SendMessageRequest {
            chat_id: "1",
            text: "hi",
            parse_mode: ParseMode::Plain.api_value(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let channel = TelegramChannel::from_config(&NotifierConfig::new("T", "C")).unwrap();
        channel.close().await;
        channel.close().await;
        assert!(channel.is_closed());
        assert!(matches!(
            channel.send_text("C", "hello", ParseMode::Plain).await,
            Err(ChannelError::Closed)
        ));
    }
}
