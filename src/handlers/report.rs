//! Utilization report handlers.
//!
//! Both handlers only clone the published snapshot pointer, so a request
//! never waits on the sampler.

use axum::{extract::State, response::IntoResponse, Json};
use herakles_thp_exporter::{render_report, Snapshot};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the `/thp_utilization` endpoint.
#[instrument(skip(state))]
pub async fn thp_utilization_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /thp_utilization request");
    state.stats.record_http_request();

    let snapshot = state.store.current();
    (
        [("Content-Type", "text/plain; charset=utf-8")],
        render_report(&snapshot, &state.geometry),
    )
}

/// Handler for the `/snapshot` endpoint.
#[instrument(skip(state))]
pub async fn snapshot_handler(State(state): State<SharedState>) -> Json<Snapshot> {
    debug!("Processing /snapshot request");
    state.stats.record_http_request();
    Json(Snapshot::clone(&state.store.current()))
}
