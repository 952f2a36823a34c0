use tokio::signal;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy)]
pub(crate) enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl ShutdownReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "ctrl_c",
            Self::Terminate => "sigterm",
        }
    }
}

async fn interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

pub(crate) async fn shutdown_signal() -> ShutdownReason {
    tokio::select! {
        _ = interrupt() => ShutdownReason::Interrupt,
        _ = terminate() => ShutdownReason::Terminate,
    }
}

/// Resolves on the first shutdown signal after telling background tasks to stop.
pub(crate) async fn broadcast_on_signal(notify: watch::Sender<bool>) {
    let reason = shutdown_signal().await;
    tracing::info!(reason = reason.as_str(), "shutdown signal received");

    if notify.send(true).is_err() {
        tracing::warn!("No background task is listening for shutdown");
    }
}
