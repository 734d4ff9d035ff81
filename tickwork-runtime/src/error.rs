//! Error types for task registration, task execution and shutdown.
//!
//! - [`ConfigError`]: a task or the scheduler was configured incorrectly.
//!   Raised synchronously, never degraded to a no-op task.
//! - [`TaskError`]: returned by a task callback. Contained within the tick
//!   that produced it.
//! - [`ShutdownError`]: the host stopped and a task did not go idle within
//!   the grace period. The only error that escapes the scheduler.

use std::time::Duration;
use thiserror::Error;

/// Invalid task or scheduler configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("task name must not be empty")]
    EmptyName,

    #[error("task {name:?} has no callback")]
    MissingCallback { name: String },

    #[error("task {name:?} has no interval")]
    MissingInterval { name: String },

    #[error("interval {interval:?} for task {name:?} is below the minimum of {minimum:?}")]
    IntervalTooShort {
        name: String,
        interval: Duration,
        minimum: Duration,
    },

    #[error("invalid interval expression {value:?}")]
    InvalidInterval { value: String },

    #[error("a task named {name:?} is already registered")]
    DuplicateName { name: String },

    #[error("invalid scheduler setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    /// Returns a short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::EmptyName => "config_empty_name",
            ConfigError::MissingCallback { .. } => "config_missing_callback",
            ConfigError::MissingInterval { .. } => "config_missing_interval",
            ConfigError::IntervalTooShort { .. } => "config_interval_too_short",
            ConfigError::InvalidInterval { .. } => "config_invalid_interval",
            ConfigError::DuplicateName { .. } => "config_duplicate_name",
            ConfigError::InvalidSetting { .. } => "config_invalid_setting",
            ConfigError::Source(_) => "config_source",
        }
    }
}

/// Outcome of a failed task callback.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The callback observed the stopping token and unwound.
    #[error("task cancelled")]
    Canceled,

    /// Any other failure raised by the callback.
    #[error("task failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The callback panicked; the payload message is captured when it is a string.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wraps any error as [`TaskError::Failed`].
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TaskError::Failed(error.into())
    }

    /// True when the failure is the callback honouring cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Returns a short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Failed(_) => "task_failed",
            TaskError::Panicked(_) => "task_panicked",
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(error: std::io::Error) -> Self {
        TaskError::Failed(Box::new(error))
    }
}

/// A task did not honour cancellation during host shutdown.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("cancellation was not honoured within {grace:?}; stuck tasks: {stuck:?}")]
    GraceExceeded {
        grace: Duration,
        stuck: Vec<String>,
    },
}

impl ShutdownError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::GraceExceeded { .. } => "shutdown_grace_exceeded",
        }
    }

    /// Names of the tasks that were still running when the grace period elapsed.
    pub fn stuck_tasks(&self) -> &[String] {
        match self {
            ShutdownError::GraceExceeded { stuck, .. } => stuck,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_canceled_counts_as_cancellation() {
        assert!(TaskError::Canceled.is_cancellation());
        assert!(!TaskError::failed("boom").is_cancellation());
        assert!(!TaskError::Panicked("boom".into()).is_cancellation());
    }

    #[test]
    fn io_errors_convert_to_failed() {
        let err: TaskError = std::io::Error::other("disk gone").into();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(err.to_string(), "task failed: disk gone");
    }

    #[test]
    fn grace_exceeded_lists_stuck_tasks() {
        let err = ShutdownError::GraceExceeded {
            grace: Duration::from_secs(5),
            stuck: vec!["cleanup".into()],
        };
        assert_eq!(err.stuck_tasks(), ["cleanup".to_string()]);
        assert_eq!(err.as_label(), "shutdown_grace_exceeded");
    }
}
