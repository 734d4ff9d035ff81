use super::execution::{ExecutionOutcome, TickHandler};
use super::shutdown::await_quiescence;
use crate::config::SchedulerSettings;
use crate::error::{ConfigError, ShutdownError};
use crate::lifecycle::{OnStarted, OnStopping};
use crate::monitor::{JobMonitor, MonitorState};
use crate::registry::MonitorRegistry;
use crate::scope::ScopeFactory;
use crate::task::BackgroundTask;
use config::Config;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type StopWatcher = JoinHandle<Result<(), ShutdownError>>;

/// Binds recurring tasks to a host lifecycle.
///
/// Each registered task gets a [`JobMonitor`]. When the host signals
/// "started" the monitor begins ticking; when it signals "stopping" the
/// scheduler waits (bounded by [`SchedulerSettings::grace_period`]) for the
/// task to go idle and disposes it.
pub struct BackgroundScheduler<F: ScopeFactory, L> {
    pub(crate) lifetime: L,
    pub(crate) scope_factory: Arc<F>,
    pub(crate) registry: Arc<MonitorRegistry>,
    pub(crate) handlers: DashMap<String, Arc<TickHandler<F>>>,
    pub(crate) settings: SchedulerSettings,
    pub(crate) config: Arc<Config>,
    pub(crate) watchers: Mutex<Vec<(String, StopWatcher)>>,
}

impl<F, L> BackgroundScheduler<F, L>
where
    F: ScopeFactory,
    L: OnStarted + OnStopping,
{
    /// Scheduler with default settings and an empty config.
    pub fn new(lifetime: L, scope_factory: F) -> Self {
        Self::from_parts(
            lifetime,
            scope_factory,
            SchedulerSettings::default(),
            Arc::new(Config::default()),
        )
    }

    pub(crate) fn from_parts(
        lifetime: L,
        scope_factory: F,
        settings: SchedulerSettings,
        config: Arc<Config>,
    ) -> Self {
        Self {
            lifetime,
            scope_factory: Arc::new(scope_factory),
            registry: Arc::new(MonitorRegistry::new()),
            handlers: DashMap::new(),
            settings,
            config,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Register a task and tie it to the host lifecycle.
    ///
    /// Fails without registering anything when the name is taken or the
    /// interval is below the configured minimum. Must be called from within
    /// a tokio runtime.
    pub fn register_background_task(&self, task: BackgroundTask<F::Scope>) -> Result<(), ConfigError> {
        if task.interval() < self.settings.minimum_interval {
            return Err(ConfigError::IntervalTooShort {
                name: task.name().to_string(),
                interval: task.interval(),
                minimum: self.settings.minimum_interval,
            });
        }

        let monitor = self.registry.insert(task.name())?;
        let name = task.shared_name();
        let interval = task.interval();
        let run_immediately = task.run_immediately();

        let stopping = self.lifetime.stopping();
        let handler = Arc::new(TickHandler::new(
            task,
            Arc::clone(&self.registry),
            Arc::clone(&self.scope_factory),
            stopping.clone(),
        ));
        self.handlers.insert(name.to_string(), Arc::clone(&handler));

        let watcher = tokio::spawn(supervise(
            name.to_string(),
            monitor,
            handler,
            interval,
            run_immediately,
            self.lifetime.started(),
            stopping,
            self.settings,
        ));
        self.watchers_guard().push((name.to_string(), watcher));

        info!(task = %name, ?interval, run_immediately, "registered background task");
        Ok(())
    }

    /// Run one tick of `name` right now, through the same single-flight gate
    /// as timer ticks. `None` if no such task is registered.
    pub async fn trigger(&self, name: &str) -> Option<ExecutionOutcome> {
        let handler = self.handlers.get(name).map(|h| Arc::clone(h.value()))?;
        Some(handler.run().await)
    }

    /// Wait until every registered task has gone through its stopping
    /// handler.
    ///
    /// Resolves only after the host signalled "stopping". Returns
    /// [`ShutdownError::GraceExceeded`] naming every task that did not honour
    /// cancellation in time.
    pub async fn wait_for_shutdown(&self) -> Result<(), ShutdownError> {
        let watchers = std::mem::take(&mut *self.watchers_guard());
        let mut stuck = Vec::new();

        for (name, watcher) in watchers {
            match watcher.await {
                Ok(Ok(())) => {}
                Ok(Err(ShutdownError::GraceExceeded { stuck: names, .. })) => stuck.extend(names),
                Err(e) => {
                    error!(task = %name, error = %e, "stopping handler did not complete");
                    stuck.push(name);
                }
            }
        }

        if stuck.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError::GraceExceeded {
                grace: self.settings.grace_period,
                stuck,
            })
        }
    }

    pub fn task_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn state(&self, name: &str) -> Option<MonitorState> {
        self.registry.get(name).map(|m| m.state())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.registry.get(name).is_some_and(|m| m.is_running())
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Config the scheduler was built with, for resolving task placeholders.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn watchers_guard(&self) -> std::sync::MutexGuard<'_, Vec<(String, StopWatcher)>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lifecycle of one task: wait for "started", arm the monitor, wait for
/// "stopping", drain.
#[allow(clippy::too_many_arguments)]
async fn supervise<F: ScopeFactory>(
    name: String,
    monitor: Arc<JobMonitor>,
    handler: Arc<TickHandler<F>>,
    interval: std::time::Duration,
    run_immediately: bool,
    started: CancellationToken,
    stopping: CancellationToken,
    settings: SchedulerSettings,
) -> Result<(), ShutdownError> {
    tokio::select! {
        biased;
        _ = stopping.cancelled() => {
            debug!(task = %name, "host stopped before starting; task never armed");
            monitor.dispose();
            return Ok(());
        }
        _ = started.cancelled() => {}
    }

    let ticker = Arc::clone(&handler);
    monitor.start(move || ticker.dispatch(), interval);
    info!(task = %name, ?interval, "background task armed");

    if run_immediately {
        handler.dispatch();
    }

    stopping.cancelled().await;
    debug!(task = %name, "host stopping; waiting for background task to finish");
    await_quiescence(&name, &monitor, &settings).await
}
