use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tickwork::{
    background_task, ApplicationLifetime, BackgroundScheduler, CancellationToken, NoScope,
    TaskError,
};
use tracing::info;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Runs every 500 milliseconds, once right away
#[background_task(interval = "500ms", run_immediately = true)]
async fn heartbeat(_scope: (), _token: CancellationToken) -> Result<(), TaskError> {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
    info!(count, "heartbeat");
    Ok(())
}

/// Takes longer than its interval, so overlapping ticks are skipped
#[background_task(interval = "1s")]
async fn slow_export(_scope: (), token: CancellationToken) -> Result<(), TaskError> {
    tokio::select! {
        _ = token.cancelled() => Err(TaskError::Canceled),
        _ = tokio::time::sleep(Duration::from_millis(2500)) => {
            info!("export finished");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let lifetime = ApplicationLifetime::new();
    let scheduler = BackgroundScheduler::new(lifetime.clone(), NoScope);
    scheduler.register_background_task(heartbeat_task()?)?;
    scheduler.register_background_task(slow_export_task()?)?;

    lifetime.notify_started();

    // Run for 5 seconds, then stop as a host would on SIGTERM
    tokio::time::sleep(Duration::from_secs(5)).await;
    lifetime.stop_application();
    scheduler.wait_for_shutdown().await?;

    info!(executions = COUNTER.load(Ordering::SeqCst), "heartbeat executions (expected ~10)");
    Ok(())
}
