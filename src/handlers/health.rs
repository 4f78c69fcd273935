//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! sampler statistics as a plain-text table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str =
    "More info: https://www.herakles.now | Support: exporter@herakles.now";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.stats.record_http_request();

    let snapshot = state.store.current();
    let message = if snapshot.sweeps == 0 {
        "OK - First sweep in progress"
    } else {
        "OK"
    };

    let uptime_hours = state.stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = state.stats.render_table();
    let source = state.memory_source;
    let geometry = state.geometry;

    debug!("Health check: {}", message);
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nMemory source: {source}\n\
             Geometry: {} pages per block, {} buckets, {} candidates per tick\n\n\
             {table}\n{FOOTER_TEXT}",
            geometry.block_pages, geometry.bucket_count, geometry.scan_chunk
        ),
    )
}
