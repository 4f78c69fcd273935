//! Incremental scan engine.
//!
//! This module provides:
//! - `bucket`: utilization to histogram bucket mapping
//! - `classifier`: counts non-zero units in one large block
//! - `region`: flattened region arena and the scan cursor
//! - `chunk`: one bounded unit of scanning work
//! - `engine`: the per-tick state machine that ties them together

pub mod bucket;
pub mod chunk;
pub mod classifier;
pub mod engine;
pub mod region;

use serde::{Deserialize, Serialize};

use crate::error::SamplerError;

pub use bucket::{bucket_for, bucket_range};
pub use chunk::{scan_chunk, ChunkOutcome};
pub use classifier::count_utilized;
pub use engine::{ScanEngine, TickOutcome};
pub use region::{align_up, Cursor, RegionMap};

/// Base units per large block (one PMD-sized THP of 4 KiB pages).
pub const DEFAULT_BLOCK_PAGES: u64 = 512;
/// Number of utilization buckets.
pub const DEFAULT_BUCKET_COUNT: usize = 10;
/// Candidate block positions examined per tick.
pub const DEFAULT_SCAN_CHUNK: usize = 256;
/// Delay between ticks in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Fixed sizes that shape a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanGeometry {
    pub block_pages: u64,
    pub bucket_count: usize,
    pub scan_chunk: usize,
}

impl Default for ScanGeometry {
    fn default() -> Self {
        Self {
            block_pages: DEFAULT_BLOCK_PAGES,
            bucket_count: DEFAULT_BUCKET_COUNT,
            scan_chunk: DEFAULT_SCAN_CHUNK,
        }
    }
}

impl ScanGeometry {
    pub fn new(block_pages: u64, bucket_count: usize, scan_chunk: usize) -> Self {
        Self {
            block_pages,
            bucket_count,
            scan_chunk,
        }
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.block_pages == 0 {
            return Err(SamplerError::InvalidGeometry(
                "block_pages must be positive".into(),
            ));
        }
        if self.bucket_count == 0 {
            return Err(SamplerError::InvalidGeometry(
                "bucket_count must be positive".into(),
            ));
        }
        if self.bucket_count as u64 > self.block_pages {
            return Err(SamplerError::InvalidGeometry(format!(
                "bucket_count {} exceeds block_pages {}",
                self.bucket_count, self.block_pages
            )));
        }
        if self.scan_chunk == 0 {
            return Err(SamplerError::InvalidGeometry(
                "scan_chunk must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_is_valid() {
        let geometry = ScanGeometry::default();
        assert!(geometry.validate().is_ok());
        assert_eq!(geometry.block_pages, 512);
        assert_eq!(geometry.bucket_count, 10);
        assert_eq!(geometry.scan_chunk, 256);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(ScanGeometry::new(0, 10, 256).validate().is_err());
        assert!(ScanGeometry::new(512, 0, 256).validate().is_err());
        assert!(ScanGeometry::new(512, 10, 0).validate().is_err());
        assert!(ScanGeometry::new(4, 5, 1).validate().is_err());
        assert!(ScanGeometry::new(4, 4, 1).validate().is_ok());
    }
}
