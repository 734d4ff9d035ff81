use std::time::Duration;
use tickwork::tickwork_runtime::resolve_interval;
use tickwork::{
    ApplicationLifetime, BackgroundTask, CancellationToken, NoScope, SchedulerBuilder, TaskError,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let lifetime = ApplicationLifetime::new();
    let scheduler = SchedulerBuilder::new(lifetime.clone(), NoScope)
        .with_toml("demos/config/application.toml")?
        .build()?;

    // Interval comes from config, with a fallback
    let interval = resolve_interval("${app.sync_interval:2s}", scheduler.config())?;
    let sync = BackgroundTask::builder("sync-inventory")
        .interval(interval)
        .callback(|_: (), _: CancellationToken| async {
            info!("syncing inventory");
            Ok(())
        })
        .build()?;
    scheduler.register_background_task(sync)?;

    // Ignores cancellation on purpose: shutdown reports it after the grace period
    let stubborn = BackgroundTask::builder("stubborn")
        .interval_str("1s")
        .run_immediately(true)
        .callback(|_: (), _: CancellationToken| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), TaskError>(())
        })
        .build()?;
    scheduler.register_background_task(stubborn)?;

    lifetime.notify_started();
    tokio::time::sleep(Duration::from_secs(3)).await;
    lifetime.stop_application();

    if let Err(e) = scheduler.wait_for_shutdown().await {
        error!(error = %e, stuck = ?e.stuck_tasks(), "background tasks did not stop in time");
        std::process::exit(1);
    }
    Ok(())
}
