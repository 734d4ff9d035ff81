use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickwork::{ApplicationLifetime, BackgroundTask, CancellationToken, SchedulerBuilder, TaskError};
use tracing::info;

/// Stand-in for a pooled connection checked out for one execution.
struct Connection {
    id: u64,
}

impl Drop for Connection {
    fn drop(&mut self) {
        info!(connection = self.id, "connection returned to pool");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickwork_runtime=debug".into()),
        )
        .init();

    let next_id = Arc::new(AtomicU64::new(1));
    let pool = move || Connection {
        id: next_id.fetch_add(1, Ordering::SeqCst),
    };

    let lifetime = ApplicationLifetime::new();
    let scheduler = SchedulerBuilder::new(lifetime.clone(), pool).build()?;

    let task = BackgroundTask::builder("refresh-cache")
        .interval_str("1s")
        .run_immediately(true)
        .callback(|conn: Connection, token: CancellationToken| async move {
            if token.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            info!(connection = conn.id, "refreshing cache");
            Ok(())
        })
        .build()?;
    scheduler.register_background_task(task)?;

    lifetime.stop_on_signal();
    lifetime.notify_started();
    info!("press Ctrl-C to stop");

    scheduler.wait_for_shutdown().await?;
    Ok(())
}
