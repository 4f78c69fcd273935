//! Root endpoint handler for the landing page.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;

    let health_line = if state.config.enable_health.unwrap_or(true) {
        "  /health            Sampler statistics\n"
    } else {
        ""
    };

    let body = format!(
        "Herakles THP Exporter {version}\n\
         \n\
         Uptime: {hours}h {minutes}m {seconds}s\n\
         Memory source: {source}\n\
         Completed sweeps: {sweeps}\n\
         \n\
         Endpoints:\n\
         \x20 /thp_utilization   Huge page utilization report (text)\n\
         \x20 /snapshot          Last published sweep (JSON)\n\
         \x20 /metrics           Prometheus metrics\n\
         {health_line}\
         \n\
         {FOOTER_TEXT}\n",
        source = state.memory_source,
        sweeps = state.store.current().sweeps,
    );

    ([("Content-Type", "text/plain; charset=utf-8")], body)
}
