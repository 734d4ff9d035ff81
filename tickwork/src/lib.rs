//! # Tickwork - recurring background tasks for long-running services
//!
//! Tickwork runs named, periodic units of work inside a host process:
//!
//! - **Aligned intervals**: the first run lands on a clean wall-clock
//!   boundary of the interval (a 30s task fires at :00 and :30).
//! - **Single flight**: if a run is still going when the next tick fires,
//!   that tick is skipped, never queued.
//! - **Cooperative shutdown**: every run receives the host's stopping token.
//!   When the host stops, each task gets a grace period to finish; a task
//!   that ignores cancellation is reported as a [`ShutdownError`].
//! - **Scoped resources**: a [`ScopeFactory`] hands each run its own scope,
//!   dropped when the run ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tickwork::{
//!     background_task, ApplicationLifetime, BackgroundScheduler, CancellationToken, NoScope,
//!     TaskError,
//! };
//!
//! #[background_task(interval = "30s", run_immediately = true)]
//! async fn purge_sessions(_scope: (), token: CancellationToken) -> Result<(), TaskError> {
//!     if token.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lifetime = ApplicationLifetime::new();
//!     let scheduler = BackgroundScheduler::new(lifetime.clone(), NoScope);
//!     scheduler.register_background_task(purge_sessions_task()?)?;
//!
//!     lifetime.stop_on_signal();
//!     lifetime.notify_started();
//!
//!     // Resolves once the host is stopping and every task has drained
//!     scheduler.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Shutdown timing can come from `config/application.toml`:
//!
//! ```toml
//! [tickwork]
//! grace_period = "5s"
//! poll_interval = "100ms"
//! minimum_interval = "250ms"
//! ```
//!
//! or the equivalent YAML, loaded with
//! [`SchedulerBuilder::with_toml`] / [`SchedulerBuilder::with_yaml`].
//! Environment variables with the `APP_` prefix override file values.

// Re-export macros
pub use tickwork_macro::background_task;

// Re-export core types
pub use tickwork_runtime::{
    ApplicationLifetime, BackgroundScheduler, BackgroundTask, CancellationToken, Config,
    ConfigError, ExecutionOutcome, MonitorState, NoScope, OnStarted, OnStopping, SchedulerBuilder,
    SchedulerSettings, ScopeFactory, ShutdownError, TaskError, TimeUnit, MIN_INTERVAL,
};

// Make tickwork_runtime available for macro expansion
pub use tickwork_runtime;
