//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler. Gauges are refreshed
//! from the published snapshot on every scrape, then the registry is encoded
//! in Prometheus text format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.stats.record_http_request();

    let snapshot = state.store.current();
    state
        .metrics
        .update_from_snapshot(&snapshot, &state.geometry);

    if let Some(telemetry) = &state.telemetry {
        telemetry.update_from_stats(&state.stats);
        telemetry
            .scrape_duration_seconds
            .set(start.elapsed().as_secs_f64());
    }

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    debug!(
        "Metrics request completed: sweep {}, {} bytes, {:.3}ms",
        snapshot.sweeps,
        buffer.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
