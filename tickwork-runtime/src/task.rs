use crate::error::{ConfigError, TaskError};
use crate::time_unit::parse_interval;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hard floor for task intervals.
pub const MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Type-erased task callback: receives a freshly created scope and the host's
/// stopping token.
pub type TaskCallback<S> =
    Arc<dyn Fn(S, CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// Immutable description of one recurring job.
///
/// `S` is the scope type handed to every execution, produced by the
/// scheduler's [`ScopeFactory`](crate::ScopeFactory).
pub struct BackgroundTask<S> {
    name: Arc<str>,
    interval: Duration,
    run_immediately: bool,
    callback: TaskCallback<S>,
}

impl<S> Clone for BackgroundTask<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            interval: self.interval,
            run_immediately: self.run_immediately,
            callback: self.callback.clone(),
        }
    }
}

impl<S> fmt::Debug for BackgroundTask<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("run_immediately", &self.run_immediately)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> BackgroundTask<S> {
    /// Create a task that fires every `interval`.
    ///
    /// Fails when `name` is empty or `interval` is below [`MIN_INTERVAL`].
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, callback: F) -> Result<Self, ConfigError>
    where
        F: Fn(S, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::builder(name).interval(interval).callback(callback).build()
    }

    /// Create a new builder for BackgroundTask
    pub fn builder(name: impl Into<String>) -> BackgroundTaskBuilder<S> {
        BackgroundTaskBuilder {
            name: name.into(),
            interval: None,
            run_immediately: false,
            callback: None,
        }
    }

    /// Copy of this task with the run-immediately flag changed.
    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn run_immediately(&self) -> bool {
        self.run_immediately
    }

    /// Invoke the callback with a scope and the stopping token.
    pub fn invoke(&self, scope: S, token: CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> {
        (self.callback)(scope, token)
    }
}

/// Builder for BackgroundTask
pub struct BackgroundTaskBuilder<S> {
    name: String,
    interval: Option<Result<Duration, String>>,
    run_immediately: bool,
    callback: Option<TaskCallback<S>>,
}

impl<S: 'static> BackgroundTaskBuilder<S> {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(Ok(interval));
        self
    }

    /// Interval as shorthand (`"250ms"`, `"5s"`) or bare milliseconds.
    /// A malformed value is reported by [`build`](Self::build).
    pub fn interval_str(mut self, interval: &str) -> Self {
        self.interval = Some(parse_interval(interval).ok_or_else(|| interval.to_string()));
        self
    }

    pub fn run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    pub fn callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(S, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let callback: TaskCallback<S> = Arc::new(move |scope: S, token: CancellationToken| {
            Box::pin(callback(scope, token)) as BoxFuture<'static, Result<(), TaskError>>
        });
        self.callback = Some(callback);
        self
    }

    pub fn build(self) -> Result<BackgroundTask<S>, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let interval = match self.interval {
            None => return Err(ConfigError::MissingInterval { name: self.name }),
            Some(Err(value)) => return Err(ConfigError::InvalidInterval { value }),
            Some(Ok(interval)) => interval,
        };
        if interval < MIN_INTERVAL {
            return Err(ConfigError::IntervalTooShort {
                name: self.name,
                interval,
                minimum: MIN_INTERVAL,
            });
        }

        let callback = self
            .callback
            .ok_or_else(|| ConfigError::MissingCallback { name: self.name.clone() })?;

        Ok(BackgroundTask {
            name: Arc::from(self.name),
            interval,
            run_immediately: self.run_immediately,
            callback,
        })
    }
}
