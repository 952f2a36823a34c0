use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::metrics;
use crate::services::session_store::SessionManager;

/// Drops idle login sessions (and the quizzes they own) until shutdown is signalled.
pub(crate) async fn run(
    sessions: SessionManager,
    sweep_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(sweep_every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let removed = sessions.sweep_expired().await;
                let active = sessions.len().await;
                metrics::record_active_sessions(active);
                if removed > 0 {
                    tracing::info!(removed, active, "Expired sessions swept");
                }
            }
        }
    }

    tracing::debug!("Session cleanup stopped");
}
