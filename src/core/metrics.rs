use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("quiz_banks_loaded_total", "Question banks loaded into sessions");
    metrics::describe_counter!("quiz_answers_scored_total", "Answers scored, by outcome");
    metrics::describe_histogram!(
        "quiz_scoring_duration_seconds",
        "Wall time of a full scoring pass including answer embedding"
    );
    metrics::describe_gauge!("quiz_active_sessions", "Live login sessions");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_bank_loaded(outcome: &'static str) {
    metrics::counter!("quiz_banks_loaded_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_scoring(correct: usize, incorrect: usize, elapsed: Duration) {
    metrics::counter!("quiz_answers_scored_total", "outcome" => "correct")
        .increment(correct as u64);
    metrics::counter!("quiz_answers_scored_total", "outcome" => "incorrect")
        .increment(incorrect as u64);
    metrics::histogram!("quiz_scoring_duration_seconds").record(elapsed.as_secs_f64());
}

pub(crate) fn record_active_sessions(count: usize) {
    metrics::gauge!("quiz_active_sessions").set(count as f64);
}
