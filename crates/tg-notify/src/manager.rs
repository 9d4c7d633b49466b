//! Process-wide entry point for notifications.
//!
//! [`ErrorManager`] owns at most one [`Notifier`]. Until it is configured,
//! every notify call falls back to a local log line, so instrumented code
//! never has to check whether notifications are set up.
//!
//! Reports raised outside a Tokio runtime are queued to a worker thread owned
//! by the manager, which delivers them in order on its own runtime.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channels::NotifyChannel;
use crate::config::NotifierConfig;
use crate::error::NotifierError;
use crate::events::{Category, Details, Notification, Severity};
use crate::notifier::{log_notification, DeliveryOutcome, ErrorRef, Notifier};
use crate::templates::Templates;

static GLOBAL_MANAGER: OnceLock<ErrorManager> = OnceLock::new();

/// Handle to the notification manager.
///
/// Clones share the same state. Hosts can create their own with
/// [`ErrorManager::new`] or use the process-wide one from
/// [`ErrorManager::global`].
#[derive(Clone, Default)]
pub struct ErrorManager {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    notifier: RwLock<Option<Arc<Notifier>>>,
    reports: OnceLock<mpsc::UnboundedSender<QueuedReport>>,
}

/// A report waiting for the worker, with the notifier current when it was raised.
type QueuedReport = (Option<Arc<Notifier>>, Notification);

impl ErrorManager {
    /// Create an unconfigured manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide manager, configured or not.
    pub fn global() -> &'static Self {
        GLOBAL_MANAGER.get_or_init(Self::new)
    }

    /// Get the process-wide manager once it has been configured.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::IllegalState`] before `configure()`.
    pub fn get_instance() -> Result<&'static Self, NotifierError> {
        let manager = Self::global();
        if manager.is_initialized() {
            Ok(manager)
        } else {
            Err(NotifierError::IllegalState(
                "ErrorManager is not configured, call configure() first".to_string(),
            ))
        }
    }

    /// Configure the manager with a Telegram-backed notifier.
    ///
    /// A second call on a configured manager leaves the existing notifier in
    /// place and only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Configuration`] when `config` fails validation.
    pub fn configure(&self, config: NotifierConfig) -> Result<&Self, NotifierError> {
        self.install(config, Notifier::new)
    }

    /// Configure the manager with a caller-supplied channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Configuration`] when `config` fails validation.
    pub fn configure_with_channel(
        &self,
        config: NotifierConfig,
        channel: Arc<dyn NotifyChannel>,
    ) -> Result<&Self, NotifierError> {
        self.install(config, |config| Notifier::with_channel(config, channel))
    }

    fn install(
        &self,
        config: NotifierConfig,
        build: impl FnOnce(NotifierConfig) -> Notifier,
    ) -> Result<&Self, NotifierError> {
        // Held for the whole setup so concurrent configure calls cannot race.
        let mut slot = self
            .shared
            .notifier
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.is_some() {
            warn!("ErrorManager is already configured");
            return Ok(self);
        }

        config.validate()?;

        *slot = Some(Arc::new(build(config)));
        info!("ErrorManager configured");
        Ok(self)
    }

    /// Check whether `configure()` has succeeded and `close()` has not run since.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.notifier().is_some()
    }

    /// The owned notifier, if configured.
    #[must_use]
    pub fn notifier(&self) -> Option<Arc<Notifier>> {
        self.shared
            .notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Canned notifications built on top of this manager.
    #[must_use]
    pub fn templates(&self) -> Templates<'_> {
        Templates::new(self)
    }

    /// Send a prepared notification, or log it when unconfigured.
    pub async fn dispatch(&self, notification: Notification) -> DeliveryOutcome {
        deliver(self.notifier(), notification).await
    }

    /// Write only the local log line for a notification, without delivering it.
    pub(crate) fn log_only(&self, notification: &Notification) {
        if self.is_initialized() {
            log_notification(notification);
        } else {
            log_fallback(notification);
        }
    }

    /// Queue a notification for the manager's report worker.
    ///
    /// The worker thread starts on first use. It drains pending reports and
    /// stops once every handle to this manager has been dropped. If it cannot
    /// run, the notification is only logged.
    pub(crate) fn queue(&self, notification: Notification) {
        let sender = self.shared.reports.get_or_init(spawn_report_worker);

        if let Err(mpsc::error::SendError((_, notification))) =
            sender.send((self.notifier(), notification))
        {
            warn!("Report worker is not running, error report kept to the local log");
            self.log_only(&notification);
        }
    }

    async fn notify(
        &self,
        severity: Severity,
        category: Category,
        message: String,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        let Some(notifier) = self.notifier() else {
            let notification =
                Notification::new(severity, category, message).with_details(details);
            log_fallback_with_error(&notification, error);
            return DeliveryOutcome::LogOnly;
        };

        match severity {
            Severity::Info => notifier.info(category, message, details, error).await,
            Severity::Warning => notifier.warning(category, message, details, error).await,
            Severity::Error => notifier.error(category, message, details, error).await,
            Severity::Critical => notifier.critical(category, message, details, error).await,
        }
    }

    pub async fn notify_info(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Info, category, message.into(), details, error)
            .await
    }

    pub async fn notify_warning(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Warning, category, message.into(), details, error)
            .await
    }

    pub async fn notify_error(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Error, category, message.into(), details, error)
            .await
    }

    pub async fn notify_critical(
        &self,
        category: Category,
        message: impl Into<String>,
        details: Option<Details>,
        error: Option<ErrorRef<'_>>,
    ) -> DeliveryOutcome {
        self.notify(Severity::Critical, category, message.into(), details, error)
            .await
    }

    // =========================================================================
    // Category helpers
    // =========================================================================

    pub async fn database_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_error(
            Category::Database,
            format!("Database error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    pub async fn telegram_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_error(
            Category::Telegram,
            format!("Telegram API error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    pub async fn cache_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_error(
            Category::Cache,
            format!("Cache error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    pub async fn api_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_error(
            Category::Api,
            format!("API error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    pub async fn auth_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_error(
            Category::Auth,
            format!("Authentication error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    /// System failures are always reported as critical.
    pub async fn system_error(
        &self,
        operation: &str,
        error: ErrorRef<'_>,
        details: Option<Details>,
    ) -> DeliveryOutcome {
        self.notify_critical(
            Category::System,
            format!("System error while executing: {operation}"),
            details,
            Some(error),
        )
        .await
    }

    /// Release the notifier's channel and return to the unconfigured state.
    ///
    /// Does nothing on an unconfigured manager.
    pub async fn close(&self) {
        let notifier = self
            .shared
            .notifier
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(notifier) = notifier {
            notifier.close().await;
            info!("ErrorManager closed");
        }
    }
}

impl fmt::Debug for ErrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorManager")
            .field("notifier", &self.notifier())
            .field("report_worker", &self.shared.reports.get().is_some())
            .finish()
    }
}

async fn deliver(notifier: Option<Arc<Notifier>>, notification: Notification) -> DeliveryOutcome {
    match notifier {
        Some(notifier) => notifier.send(notification).await,
        None => {
            log_fallback(&notification);
            DeliveryOutcome::LogOnly
        }
    }
}

/// Start the thread draining queued reports; returns its sender.
///
/// When the thread or its runtime cannot start, the receiver is dropped and
/// every send fails.
fn spawn_report_worker() -> mpsc::UnboundedSender<QueuedReport> {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueuedReport>();

    let spawned = thread::Builder::new()
        .name("tg-notify-reports".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "Failed to build report worker runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                while let Some((notifier, notification)) = rx.recv().await {
                    deliver(notifier, notification).await;
                }
            });
            debug!("Report worker stopped");
        });

    if let Err(e) = spawned {
        error!(error = %e, "Failed to spawn report worker thread");
    }
    tx
}

/// Log line written when no notifier is configured.
pub(crate) fn fallback_line(notification: &Notification) -> String {
    let details = notification
        .details()
        .map_or_else(|| "None".to_string(), ToString::to_string);
    format!(
        "[{}] {} - {details}",
        notification.category(),
        notification.message()
    )
}

fn log_fallback(notification: &Notification) {
    log_fallback_with_error(notification, None);
}

fn log_fallback_with_error(notification: &Notification, err: Option<ErrorRef<'_>>) {
    let line = fallback_line(notification);
    let err = err.map(ToString::to_string);
    match (notification.severity(), err) {
        (Severity::Info, _) => info!("{line}"),
        (Severity::Warning, _) => warn!("{line}"),
        (Severity::Error, None) => error!("{line}"),
        (Severity::Error, Some(err)) => error!(error = %err, "{line}"),
        (Severity::Critical, None) => error!(critical = true, "{line}"),
        (Severity::Critical, Some(err)) => error!(critical = true, error = %err, "{line}"),
    }
}
