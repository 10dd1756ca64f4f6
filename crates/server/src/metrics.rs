//! Prometheus metrics registration and the `/metrics` scrape handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");

    metrics::describe_gauge!("voice_agent_calls_active", "Calls currently in progress");
    metrics::describe_counter!("voice_agent_chunks_in_total", "Inbound audio chunks processed");
    metrics::describe_counter!("voice_agent_chunks_out_total", "Outbound audio chunks emitted");
    metrics::describe_counter!("voice_agent_fillers_played_total", "Hedge fillers played");
    metrics::describe_counter!("voice_agent_interruptions_total", "Barge-in interruptions handled");
    metrics::describe_histogram!("voice_agent_model_latency_ms", "Model first-audio-byte latency");
    metrics::describe_counter!("voice_agent_reconnect_attempts_total", "Model session reconnect attempts");
    metrics::describe_counter!("voice_agent_calls_ended_total", "Calls ended, by outcome");

    handle
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> String {
    state.metrics_handle.render()
}
