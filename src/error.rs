//! Error types for the THP utilization sampler library.
//!
//! Per-tick anomalies (absent pages, ineligible blocks, unreadable units) are
//! never errors; they are skipped by the scanner. These variants cover the
//! configuration-level failures that are reported once at startup.

use std::path::PathBuf;

/// Errors raised while building or configuring the scan engine.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("No memory nodes with regions were enumerated")]
    NoMemoryNodes,

    #[error("Invalid scan geometry: {0}")]
    InvalidGeometry(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("Invalid memory layout: {0}")]
    Layout(String),
}

impl SamplerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SamplerError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, detail: impl ToString) -> Self {
        SamplerError::Parse {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}
