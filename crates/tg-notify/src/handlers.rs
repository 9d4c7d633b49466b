//! Error handlers that report failures of wrapped functions.
//!
//! An [`ErrorHandler`] wraps a sync or async function. When the function
//! returns `Err`, the failure is reported through the [`ErrorManager`] and the
//! original error is handed back to the caller untouched.
//!
//! ```no_run
//! use tg_notify::handle_database_errors;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("not found")]
//! # struct DbError;
//! # async fn fetch_user(id: u64) -> Result<String, DbError> { Err(DbError) }
//! # async fn example() -> Result<(), DbError> {
//! let load_user = handle_database_errors()
//!     .operation("load user")
//!     .wrap_async("fetch_user", fetch_user);
//!
//! let _user = load_user(42).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The async variant awaits the report before returning the error. The sync
//! variant never waits: the report is spawned on the current Tokio runtime,
//! or queued to the manager's report worker when no runtime is running.

use futures::future::{BoxFuture, FutureExt};
use std::error::Error as StdError;
use std::fmt::Debug;
use std::future::Future;
use tokio::runtime::Handle;

use crate::events::{Category, Details, Notification, Severity};
use crate::manager::ErrorManager;

/// Maximum number of characters kept from the rendered arguments.
pub const MAX_ARGS_CHARS: usize = 100;

/// Reports failures of wrapped functions under a fixed category.
#[derive(Clone)]
pub struct ErrorHandler {
    category: Category,
    operation: Option<String>,
    manager: Option<ErrorManager>,
}

impl ErrorHandler {
    #[must_use]
    pub const fn new(category: Category) -> Self {
        Self {
            category,
            operation: None,
            manager: None,
        }
    }

    /// Name the operation in reports instead of the function name.
    #[must_use]
    pub fn operation(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.operation = (!label.is_empty()).then_some(label);
        self
    }

    /// Report through `manager` instead of [`ErrorManager::global`].
    #[must_use]
    pub fn with_manager(mut self, manager: ErrorManager) -> Self {
        self.manager = Some(manager);
        self
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    fn manager(&self) -> ErrorManager {
        self.manager
            .clone()
            .unwrap_or_else(|| ErrorManager::global().clone())
    }

    fn report(
        &self,
        function: &str,
        args: String,
        error: &(dyn StdError + Send + Sync + 'static),
    ) -> Notification {
        let operation = self.operation.as_deref().unwrap_or(function);
        let details = Details::new()
            .with("function", function)
            .with("args", args);

        Notification::new(
            Severity::Error,
            self.category,
            format!("Error while executing: {operation}"),
        )
        .with_details(Some(details))
        .with_error(Some(error as &(dyn StdError + 'static)))
    }

    /// Run an async function, reporting its error before returning it.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` produced, unchanged.
    pub async fn run<A, T, E, F, Fut>(&self, function: &str, args: A, f: F) -> Result<T, E>
    where
        A: Debug,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let rendered = render_args(&args);
        self.observe(function, rendered, f(args)).await
    }

    async fn observe<T, E, Fut>(&self, function: &str, args: String, future: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        match future.await {
            Ok(value) => Ok(value),
            Err(e) => {
                let notification = self.report(function, args, &e);
                self.manager().dispatch(notification).await;
                Err(e)
            }
        }
    }

    /// Call a sync function; on error, schedule a report and return at once.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` produced, unchanged.
    pub fn call<A, T, E, F>(&self, function: &str, args: A, f: F) -> Result<T, E>
    where
        A: Debug,
        F: FnOnce(A) -> Result<T, E>,
        E: StdError + Send + Sync + 'static,
    {
        let rendered = render_args(&args);
        f(args).map_err(|e| {
            self.spawn_report(self.report(function, rendered, &e));
            e
        })
    }

    fn spawn_report(&self, notification: Notification) {
        let manager = self.manager();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    manager.dispatch(notification).await;
                });
            }
            Err(_) => manager.queue(notification),
        }
    }

    /// Wrap a sync function taking one argument (use a tuple for several).
    pub fn wrap<A, T, E, F>(self, function: &'static str, f: F) -> impl Fn(A) -> Result<T, E>
    where
        A: Debug,
        F: Fn(A) -> Result<T, E>,
        E: StdError + Send + Sync + 'static,
    {
        move |args: A| self.call(function, args, &f)
    }

    /// Wrap an async function taking one argument (use a tuple for several).
    pub fn wrap_async<A, T, E, F, Fut>(
        self,
        function: &'static str,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>>
    where
        A: Debug,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        move |args: A| {
            let rendered = render_args(&args);
            let future = f(args);
            let handler = self.clone();
            async move { handler.observe(function, rendered, future).await }.boxed()
        }
    }
}

/// Debug-render arguments, keeping at most [`MAX_ARGS_CHARS`] characters.
fn render_args(args: &impl Debug) -> String {
    format!("{args:?}").chars().take(MAX_ARGS_CHARS).collect()
}

/// Handler reporting failures under `category`.
#[must_use]
pub const fn handle_errors(category: Category) -> ErrorHandler {
    ErrorHandler::new(category)
}

#[must_use]
pub const fn handle_database_errors() -> ErrorHandler {
    handle_errors(Category::Database)
}

#[must_use]
pub const fn handle_telegram_errors() -> ErrorHandler {
    handle_errors(Category::Telegram)
}

#[must_use]
pub const fn handle_cache_errors() -> ErrorHandler {
    handle_errors(Category::Cache)
}

#[must_use]
pub const fn handle_system_errors() -> ErrorHandler {
    handle_errors(Category::System)
}

#[must_use]
pub const fn handle_api_errors() -> ErrorHandler {
    handle_errors(Category::Api)
}

#[must_use]
pub const fn handle_auth_errors() -> ErrorHandler {
    handle_errors(Category::Auth)
}
