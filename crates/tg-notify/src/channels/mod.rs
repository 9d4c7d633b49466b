//! Notification channel implementations.

pub mod telegram;

use async_trait::async_trait;

use crate::config::ParseMode;
use crate::error::ChannelError;

/// Transport capable of delivering a text message to a chat.
///
/// Implementations must be safe to call concurrently; the notifier does not
/// serialize access.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Send `text` to `chat_id` using the given formatting mode.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), ChannelError>;

    /// Release the underlying connection. Must be idempotent.
    async fn close(&self) {}
}
