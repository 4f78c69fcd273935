//! Herakles THP Utilization Sampler Library
//!
//! This library estimates how much of each transparent huge page is really
//! in use. A background sampler walks physical memory in small, bounded
//! chunks, counts the all-zero base pages inside every anonymous huge page
//! it finds, and groups the results into a utilization histogram that is
//! published once per complete sweep.
//!
//! # Features
//!
//! - **Incremental Scanning**: Each tick examines at most `scan_chunk` block positions
//! - **Consistent Snapshots**: Readers always see a complete sweep, never a partial one
//! - **Pluggable Memory Sources**: `/proc` + `/dev/mem` on Linux, or a synthetic layout for tests
//! - **Lifecycle Control**: Start, pause, resume and stop the sampler task
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use herakles_thp_exporter::{
//!     render_report, ManualClock, ScanEngine, ScanGeometry, SnapshotStore, SyntheticLayout,
//!     SyntheticMemory,
//! };
//!
//! // Two huge pages of 8 base pages each
//! let mut layout = SyntheticLayout::new(64, 8);
//! layout.region(0, 0, 16, true).block(0, 2).block(8, 8);
//!
//! let memory = Arc::new(SyntheticMemory::from_layout(&layout).unwrap());
//! let geometry = ScanGeometry::new(8, 4, 256);
//! let store = Arc::new(SnapshotStore::new(geometry.bucket_count));
//! let clock = Arc::new(ManualClock::default());
//!
//! let mut engine = ScanEngine::new(memory, clock, geometry, store.clone()).unwrap();
//! engine.run_sweep();
//!
//! let report = render_report(&store.current(), &geometry);
//! assert!(report.starts_with("Utilized[0-1]: 0 0\n"));
//! ```

pub mod clock;
pub mod error;
pub mod health_stats;
pub mod memory;
pub mod report;
pub mod sampler;
pub mod scan;
pub mod snapshot;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SamplerError;
pub use health_stats::ScanStats;
pub use memory::{
    LinuxMemory, NodeRegions, PhysicalMemory, Region, SyntheticLayout, SyntheticMemory,
};
pub use report::render_report;
pub use sampler::{Control, Sampler, SamplerHandle};
pub use scan::{
    bucket_for, bucket_range, ChunkOutcome, Cursor, RegionMap, ScanEngine, ScanGeometry,
    TickOutcome,
};
pub use snapshot::{Bucket, Histogram, Snapshot, SnapshotStore};
