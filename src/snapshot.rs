//! Histogram accumulation and snapshot publication.
//!
//! The scan task fills a [`Histogram`] during a sweep. When the sweep
//! completes the histogram is copied into an immutable [`Snapshot`] and
//! swapped into the [`SnapshotStore`], where readers pick it up by cloning
//! an `Arc`. The lock is held only for the pointer swap or clone, so a
//! reader always sees one complete sweep and never blocks the scanner.

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Aggregated counts for one utilization range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Large blocks whose utilization fell in this range.
    pub blocks: u64,
    /// Sum of all-zero units across those blocks.
    pub zero_pages: u64,
}

/// Live accumulator for the sweep in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    buckets: Vec<Bucket>,
}

impl Histogram {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Bucket::default(); bucket_count],
        }
    }

    /// Counts one block in `bucket` with `zero_pages` all-zero units.
    pub fn record(&mut self, bucket: usize, zero_pages: u64) {
        if let Some(slot) = self.buckets.get_mut(bucket) {
            slot.blocks += 1;
            slot.zero_pages += zero_pages;
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn total_blocks(&self) -> u64 {
        self.buckets.iter().map(|b| b.blocks).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.buckets.iter().all(|b| *b == Bucket::default())
    }

    pub fn reset(&mut self) {
        self.buckets.fill(Bucket::default());
    }
}

/// The published result of one completed sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub buckets: Vec<Bucket>,
    /// Clock reading when the sweep finished.
    pub last_scan_time: Duration,
    /// Time between the previous sweep's end and this one's.
    pub last_scan_duration: Duration,
    /// Completed sweeps so far, 0 before the first one finishes.
    pub sweeps: u64,
}

impl Snapshot {
    /// All-zero snapshot served before the first sweep completes.
    pub fn empty(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Bucket::default(); bucket_count],
            last_scan_time: Duration::ZERO,
            last_scan_duration: Duration::ZERO,
            sweeps: 0,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        self.buckets.iter().map(|b| b.blocks).sum()
    }

    pub fn total_zero_pages(&self) -> u64 {
        self.buckets.iter().map(|b| b.zero_pages).sum()
    }
}

/// Holder of the most recently published [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty(bucket_count))),
        }
    }

    /// Replaces the published snapshot wholesale.
    pub fn publish(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
