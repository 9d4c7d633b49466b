//! Error and event notifications delivered to a Telegram chat.
//!
//! This crate captures application errors and informational events,
//! formats them into readable messages and forwards them to a single
//! Telegram chat. Delivery is best-effort: every event is logged locally
//! first, and a failing or missing transport never affects the caller.
//!
//! # Usage
//!
//! ```no_run
//! use tg_notify::{Category, Details, ErrorManager, NotifierConfig};
//!
//! # async fn example() -> Result<(), tg_notify::NotifierError> {
//! let manager = ErrorManager::global();
//! manager.configure(NotifierConfig::new("123456:bot-token", "-1001234567890").with_app_name("Shop"))?;
//!
//! manager
//!     .notify_error(
//!         Category::Database,
//!         "Order sync failed",
//!         Some(Details::new().with("order_id", 991)),
//!         None,
//!     )
//!     .await;
//!
//! manager.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the transport used to deliver text
//! - [`TelegramChannel`] implements it on top of the Bot API
//! - [`Notifier`] formats, truncates and sends a [`Notification`]
//! - [`ErrorManager`] owns the notifier and falls back to logging when unconfigured
//! - [`ErrorHandler`] wraps sync and async functions and reports their errors

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod manager;
pub mod notifier;
pub mod templates;

pub use channels::telegram::TelegramChannel;
pub use channels::NotifyChannel;
pub use config::{NotifierConfig, ParseMode};
pub use error::{ChannelError, NotifierError};
pub use events::{Category, Details, Notification, Severity};
pub use handlers::{
    handle_api_errors, handle_auth_errors, handle_cache_errors, handle_database_errors,
    handle_errors, handle_system_errors, handle_telegram_errors, ErrorHandler,
};
pub use logging::init_logging;
pub use manager::ErrorManager;
pub use notifier::{DeliveryOutcome, ErrorRef, Notifier, TRUNCATION_SUFFIX};
pub use templates::Templates;
