//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. The sampler task writes only to the snapshot store
//! and the scan stats; handlers only read them.

use herakles_thp_exporter::{ScanGeometry, ScanStats, SnapshotStore};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::{TelemetryMetrics, ThpMetrics};

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: ThpMetrics,
    /// Present only when telemetry is enabled.
    pub telemetry: Option<TelemetryMetrics>,
    pub store: Arc<SnapshotStore>,
    pub stats: Arc<ScanStats>,
    pub geometry: ScanGeometry,
    pub config: Arc<Config>,
    /// Name of the memory source the sampler reads ("linux" or "synthetic").
    pub memory_source: &'static str,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
