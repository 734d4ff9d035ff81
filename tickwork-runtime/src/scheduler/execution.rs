use crate::error::TaskError;
use crate::registry::MonitorRegistry;
use crate::scope::ScopeFactory;
use crate::task::BackgroundTask;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};

/// What a single tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Another execution held the slot, the host was stopping, or the task
    /// has no monitor.
    Skipped,
    Completed,
    /// The callback honoured the stopping token.
    Canceled,
    /// The callback returned an error or panicked.
    Failed,
}

/// Runs one tick of a registered task: gate, scope, callback, outcome logging.
pub(crate) struct TickHandler<F: ScopeFactory> {
    task: BackgroundTask<F::Scope>,
    registry: Arc<MonitorRegistry>,
    scope_factory: Arc<F>,
    stopping: CancellationToken,
}

impl<F: ScopeFactory> TickHandler<F> {
    pub(crate) fn new(
        task: BackgroundTask<F::Scope>,
        registry: Arc<MonitorRegistry>,
        scope_factory: Arc<F>,
        stopping: CancellationToken,
    ) -> Self {
        Self {
            task,
            registry,
            scope_factory,
            stopping,
        }
    }

    /// Spawn this tick on its own tokio task.
    pub(crate) fn dispatch(self: &Arc<Self>) {
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            handler.run().await;
        });
    }

    pub(crate) async fn run(&self) -> ExecutionOutcome {
        let name = self.task.name();
        let Some(monitor) = self.registry.get(name) else {
            warn!(task = name, "no monitor registered; skipping tick");
            return ExecutionOutcome::Skipped;
        };

        // held until the end of this function, including unwinding
        let Some(_slot) = monitor.try_enter() else {
            debug!(task = name, "previous execution still in flight; skipping tick");
            return ExecutionOutcome::Skipped;
        };

        // checked while holding the slot, so a drain that saw the monitor
        // idle never races a late tick into the callback
        if self.stopping.is_cancelled() {
            debug!(task = name, "host is stopping; skipping tick");
            return ExecutionOutcome::Skipped;
        }

        let span = info_span!("background_task", task = name);
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> ExecutionOutcome {
        debug!("beginning execution");

        let token = self.stopping.clone();
        let attempt = async {
            let scope = self.scope_factory.create_scope();
            self.task.invoke(scope, token).await
        };

        match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(Ok(())) => {
                debug!("completed execution");
                ExecutionOutcome::Completed
            }
            Ok(Err(e)) if e.is_cancellation() => {
                debug!(label = e.as_label(), "execution observed cancellation");
                ExecutionOutcome::Canceled
            }
            Ok(Err(e)) => {
                error!(label = e.as_label(), error = %e, details = ?e, "uncaught task failure");
                ExecutionOutcome::Failed
            }
            Err(payload) => {
                let e = TaskError::Panicked(panic_message(payload.as_ref()));
                error!(label = e.as_label(), error = %e, "task panicked");
                ExecutionOutcome::Failed
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::NoScope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handler<Fut>(
        callback: impl Fn((), CancellationToken) -> Fut + Send + Sync + 'static,
    ) -> (Arc<TickHandler<NoScope>>, Arc<MonitorRegistry>, CancellationToken)
    where
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let registry = Arc::new(MonitorRegistry::new());
        registry.insert("job").unwrap();
        let stopping = CancellationToken::new();
        let task = BackgroundTask::new("job", Duration::from_secs(1), callback).unwrap();
        let handler = TickHandler::new(task, Arc::clone(&registry), Arc::new(NoScope), stopping.clone());
        (Arc::new(handler), registry, stopping)
    }

    #[tokio::test]
    async fn completed_execution_releases_the_slot() {
        let (handler, registry, _) = handler(|_, _| async { Ok(()) });
        assert_eq!(handler.run().await, ExecutionOutcome::Completed);
        assert!(!registry.get("job").unwrap().is_running());
    }

    #[tokio::test]
    async fn failures_are_contained() {
        let (handler, registry, _) = handler(|_, _| async { Err(TaskError::failed("database unreachable")) });
        assert_eq!(handler.run().await, ExecutionOutcome::Failed);
        assert!(!registry.get("job").unwrap().is_running());
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let (handler, registry, _) = handler(|_, _| async { panic!("boom") });
        assert_eq!(handler.run().await, ExecutionOutcome::Failed);
        assert!(!registry.get("job").unwrap().is_running());
    }

    #[tokio::test]
    async fn cancellation_is_reported_distinctly() {
        let (handler, _, stopping) = handler(|_, token: CancellationToken| async move {
            token.cancelled().await;
            Err(TaskError::Canceled)
        });
        let running = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.run().await })
        };
        tokio::task::yield_now().await;
        stopping.cancel();
        assert_eq!(running.await.unwrap(), ExecutionOutcome::Canceled);
    }

    #[tokio::test]
    async fn busy_slot_skips_without_invoking_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let (handler, registry, _) = handler(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        let monitor = registry.get("job").unwrap();
        let held = monitor.try_enter();
        assert_eq!(handler.run().await, ExecutionOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(monitor.is_running());

        drop(held);
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn ticks_after_stopping_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let (handler, registry, stopping) = handler(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        stopping.cancel();
        assert_eq!(handler.run().await, ExecutionOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!registry.get("job").unwrap().is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn late_ticks_never_run_once_a_drain_saw_the_monitor_idle() {
        for _ in 0..200 {
            let calls = Arc::new(AtomicUsize::new(0));
            let seen = Arc::clone(&calls);
            let (handler, registry, stopping) = handler(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            });
            let monitor = registry.get("job").unwrap();

            let tick = {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.run().await })
            };

            // same order as the stopping handler: signal, then observe idle
            stopping.cancel();
            let drained_idle = !monitor.is_running();
            let calls_at_drain = calls.load(Ordering::SeqCst);

            let outcome = tick.await.unwrap();
            if drained_idle {
                // anything that ran must have started before the drain looked
                assert_eq!(calls.load(Ordering::SeqCst), calls_at_drain);
            }
            if outcome == ExecutionOutcome::Skipped {
                assert_eq!(calls.load(Ordering::SeqCst), 0);
            }
            assert!(!monitor.is_running());
        }
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
