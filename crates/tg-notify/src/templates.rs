//! Canned notifications for common lifecycle events.

use crate::events::{Category, Details};
use crate::manager::ErrorManager;
use crate::notifier::{DeliveryOutcome, ErrorRef};

/// Ready-made messages sent through an [`ErrorManager`].
///
/// Obtained with [`ErrorManager::templates`].
pub struct Templates<'a> {
    manager: &'a ErrorManager,
}

impl<'a> Templates<'a> {
    pub(crate) const fn new(manager: &'a ErrorManager) -> Self {
        Self { manager }
    }

    pub async fn bot_started(&self, app_name: &str) -> DeliveryOutcome {
        self.manager
            .notify_info(Category::System, format!("🤖 {app_name} started"), None, None)
            .await
    }

    pub async fn bot_stopped(&self, app_name: &str) -> DeliveryOutcome {
        self.manager
            .notify_info(Category::System, format!("🤖 {app_name} stopped"), None, None)
            .await
    }

    pub async fn database_connected(&self) -> DeliveryOutcome {
        self.manager
            .notify_info(
                Category::Database,
                "✅ Database connection restored",
                None,
                None,
            )
            .await
    }

    pub async fn database_slow(&self) -> DeliveryOutcome {
        self.manager
            .notify_warning(Category::Database, "⚠️ Slow database connection", None, None)
            .await
    }

    pub async fn database_connection_lost(&self, error: Option<ErrorRef<'_>>) -> DeliveryOutcome {
        self.manager
            .notify_error(Category::Database, "❌ Database connection lost", None, error)
            .await
    }

    pub async fn cache_refreshed(&self) -> DeliveryOutcome {
        self.manager
            .notify_info(Category::Cache, "🔄 Cache refreshed", None, None)
            .await
    }

    pub async fn cache_failure(&self, error: Option<ErrorRef<'_>>) -> DeliveryOutcome {
        self.manager
            .notify_error(Category::Cache, "❌ Cache failure", None, error)
            .await
    }

    /// A dependency is completely down.
    pub async fn service_unavailable(
        &self,
        service: &str,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.manager
            .notify_critical(
                Category::ExternalService,
                format!("🚨 Service {service} is unavailable"),
                None,
                error,
            )
            .await
    }

    /// A dependency responds intermittently.
    pub async fn service_degraded(
        &self,
        service: &str,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.manager
            .notify_warning(
                Category::ExternalService,
                format!("⚠️ Service {service} is degraded"),
                None,
                error,
            )
            .await
    }

    pub async fn user_registered(&self, user_id: &str, username: Option<&str>) -> DeliveryOutcome {
        let mut details = Details::new().with("user_id", user_id);
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            details.insert("username", username);
        }
        self.manager
            .notify_info(
                Category::System,
                "👤 New user registered",
                Some(details),
                None,
            )
            .await
    }

    pub async fn high_load_warning(&self, service: &str, load_percent: u8) -> DeliveryOutcome {
        self.manager
            .notify_warning(
                Category::System,
                format!("📈 High load on {service}"),
                Some(Details::new().with("load_percent", load_percent)),
                None,
            )
            .await
    }
}
