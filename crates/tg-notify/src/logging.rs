//! Local logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::{normalize_log_level, NotifierConfig};

/// Install a `tracing` fmt subscriber when `logging_enabled` is set.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when logging is disabled or the host already installed a global
/// subscriber, which is then left untouched.
pub fn init_logging(config: &NotifierConfig) -> bool {
    if !config.logging_enabled {
        return false;
    }

    let level = normalize_log_level(&config.log_level).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
