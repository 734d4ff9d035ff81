//! Tickwork Runtime - in-process recurring task execution
//!
//! Runs named tasks on fixed, boundary-aligned intervals with at most one
//! execution per task in flight, and drains them within a bounded grace
//! period when the host stops.

mod config;
mod error;
mod lifecycle;
mod monitor;
mod registry;
mod scheduler;
mod scope;
mod task;
mod time_unit;

// Re-export public API
pub use self::config::{
    load_toml_config, load_yaml_config, resolve_config_value, resolve_interval, SchedulerSettings,
    DEFAULT_GRACE_PERIOD, DEFAULT_POLL_INTERVAL,
};
pub use error::{ConfigError, ShutdownError, TaskError};
pub use lifecycle::{ApplicationLifetime, OnStarted, OnStopping};
pub use monitor::{time_until_next, ExecutionSlot, JobMonitor, MonitorState};
pub use registry::MonitorRegistry;
pub use scheduler::{BackgroundScheduler, ExecutionOutcome, SchedulerBuilder};
pub use scope::{NoScope, ScopeFactory};
pub use task::{BackgroundTask, BackgroundTaskBuilder, TaskCallback, MIN_INTERVAL};
pub use time_unit::{parse_interval, TimeUnit};
pub use ::config::Config;
pub use tokio_util::sync::CancellationToken;
