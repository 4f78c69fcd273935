//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page listing the endpoints
//! - `/thp_utilization`: Plain-text utilization report
//! - `/snapshot`: The same snapshot as JSON
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Sampler statistics

pub mod health;
pub mod metrics;
pub mod report;
pub mod root;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use report::{snapshot_handler, thp_utilization_handler};
pub use root::root_handler;
