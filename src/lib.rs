pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use tokio::sync::watch;

use crate::core::{config::Settings, state::AppState, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let embedder = services::embedding::from_settings(&settings).await?;
    let state = AppState::new(settings, db_pool, embedder);
    state.question_files().ensure_root().await?;

    if let Err(err) = core::bootstrap::ensure_superuser(&state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_every =
        Duration::from_secs(state.settings().quiz().session_sweep_interval_seconds.max(1));
    let cleanup = tokio::spawn(tasks::session_cleanup::run(
        state.sessions().clone(),
        sweep_every,
        shutdown_rx,
    ));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        question_bank_dir = %state.question_files().root().display(),
        "Quizcheck API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::broadcast_on_signal(shutdown_tx))
        .await;

    if let Err(err) = cleanup.await {
        tracing::warn!(error = %err, "Session cleanup task ended abnormally");
    }

    result?;

    Ok(())
}
