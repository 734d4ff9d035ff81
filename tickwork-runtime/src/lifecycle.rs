//! Host lifecycle capabilities.
//!
//! The scheduler only needs to know two things about its host: when it has
//! finished starting, and when it begins stopping. Both are modelled as
//! [`CancellationToken`]s that are cancelled exactly once, so any framework
//! can adapt its own events by cancelling a token.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Fires once the host has finished starting.
pub trait OnStarted: Send + Sync + 'static {
    /// Token that is cancelled when the host reaches "started".
    fn started(&self) -> CancellationToken;
}

/// Fires when the host begins stopping.
pub trait OnStopping: Send + Sync + 'static {
    /// Token that is cancelled when the host begins stopping. Passed into
    /// every task callback as its cooperative cancellation signal.
    fn stopping(&self) -> CancellationToken;
}

/// Ready-made lifetime for hosts that drive start/stop themselves.
#[derive(Debug, Clone, Default)]
pub struct ApplicationLifetime {
    started: CancellationToken,
    stopping: CancellationToken,
}

impl ApplicationLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that the host has started.
    pub fn notify_started(&self) {
        self.started.cancel();
    }

    /// Signal that the host is stopping.
    pub fn stop_application(&self) {
        self.stopping.cancel();
    }

    pub fn is_started(&self) -> bool {
        self.started.is_cancelled()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// Spawn a listener that calls [`stop_application`](Self::stop_application)
    /// when the process receives a termination signal.
    pub fn stop_on_signal(&self) -> tokio::task::JoinHandle<()> {
        let lifetime = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = lifetime.stopping.cancelled() => {}
                received = wait_for_shutdown_signal() => {
                    match received {
                        Ok(()) => info!("termination signal received; stopping"),
                        Err(e) => error!(error = %e, "failed to listen for termination signals; stopping"),
                    }
                    lifetime.stop_application();
                }
            }
        })
    }
}

impl OnStarted for ApplicationLifetime {
    fn started(&self) -> CancellationToken {
        self.started.clone()
    }
}

impl OnStopping for ApplicationLifetime {
    fn stopping(&self) -> CancellationToken {
        self.stopping.clone()
    }
}

/// Completes on SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_fire_once_and_are_shared_between_clones() {
        let lifetime = ApplicationLifetime::new();
        let copy = lifetime.clone();
        let started = lifetime.started();

        assert!(!started.is_cancelled());
        copy.notify_started();
        assert!(started.is_cancelled());
        assert!(lifetime.is_started());
        assert!(!lifetime.is_stopping());

        lifetime.stop_application();
        assert!(copy.stopping().is_cancelled());
    }

    #[tokio::test]
    async fn signal_listener_exits_when_stopped_elsewhere() {
        let lifetime = ApplicationLifetime::new();
        let listener = lifetime.stop_on_signal();
        lifetime.stop_application();
        listener.await.unwrap();
        assert!(lifetime.is_stopping());
    }
}
