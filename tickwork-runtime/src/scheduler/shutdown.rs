use crate::config::SchedulerSettings;
use crate::error::ShutdownError;
use crate::monitor::JobMonitor;
use tokio::time::Instant;
use tracing::{debug, error};

/// Wait for `monitor` to go idle, then dispose it.
///
/// Polls every `poll_interval` for at most `grace_period`. When the grace
/// period runs out the monitor is disposed anyway, a critical record is
/// logged and [`ShutdownError::GraceExceeded`] is returned for the host to
/// escalate. The execution that ignored cancellation keeps running
/// unsupervised.
pub(crate) async fn await_quiescence(
    name: &str,
    monitor: &JobMonitor,
    settings: &SchedulerSettings,
) -> Result<(), ShutdownError> {
    monitor.begin_stopping();
    let deadline = Instant::now() + settings.grace_period;

    while monitor.is_running() {
        if Instant::now() >= deadline {
            monitor.dispose();
            error!(
                task = name,
                severity = "critical",
                grace = ?settings.grace_period,
                "cancellation was not honoured; the maximum threshold was exceeded waiting for a background task to complete"
            );
            return Err(ShutdownError::GraceExceeded {
                grace: settings.grace_period,
                stuck: vec![name.to_string()],
            });
        }
        tokio::time::sleep(settings.poll_interval).await;
    }

    monitor.dispose();
    debug!(task = name, "background task stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts ERROR events tagged `severity = "critical"`.
    #[derive(Clone, Default)]
    struct CriticalEvents(Arc<AtomicUsize>);

    impl CriticalEvents {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct SeverityField(bool);

    impl Visit for SeverityField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "severity" && value == "critical" {
                self.0 = true;
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for CriticalEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut severity = SeverityField::default();
            event.record(&mut severity);
            if severity.0 && *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn capture_critical() -> (CriticalEvents, tracing::subscriber::DefaultGuard) {
        let events = CriticalEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        (events, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test(start_paused = true)]
    async fn idle_monitor_disposes_immediately() {
        let monitor = JobMonitor::new();
        let started = Instant::now();
        await_quiescence("idle", &monitor, &SchedulerSettings::default())
            .await
            .unwrap();
        assert!(monitor.is_disposed());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_in_flight_execution_to_finish() {
        let monitor = Arc::new(JobMonitor::new());
        let slot = monitor.try_enter();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            drop(slot);
        });

        let (critical, _guard) = capture_critical();
        let started = Instant::now();
        await_quiescence("draining", &monitor, &SchedulerSettings::default())
            .await
            .unwrap();
        assert_eq!(critical.count(), 0);
        assert!(monitor.is_disposed());
        assert!(started.elapsed() >= Duration::from_millis(350));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_period_expiry_forces_dispose_and_escalates() {
        let monitor = Arc::new(JobMonitor::new());
        let _stuck = monitor.try_enter();

        let (critical, _guard) = capture_critical();
        let started = Instant::now();
        let err = await_quiescence("stubborn", &monitor, &SchedulerSettings::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ShutdownError::GraceExceeded {
                grace: Duration::from_millis(5000),
                stuck: vec!["stubborn".to_string()],
            }
        );
        assert_eq!(critical.count(), 1);
        assert!(monitor.is_disposed());
        assert!(monitor.is_running());
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert!(started.elapsed() < Duration::from_millis(5200));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_reports_stopping_while_draining() {
        let monitor = Arc::new(JobMonitor::new());
        monitor.start(|| {}, Duration::from_secs(60));
        let slot = monitor.try_enter();

        let draining = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move {
                await_quiescence("draining", &monitor, &SchedulerSettings::default()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(monitor.state(), MonitorState::Stopping);

        drop(slot);
        draining.await.unwrap().unwrap();
        assert_eq!(monitor.state(), MonitorState::Disposed);
    }
}
