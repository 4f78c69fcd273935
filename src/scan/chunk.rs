//! One bounded unit of scanning work.

use serde::Serialize;
use tracing::trace;

use super::{bucket_for, count_utilized, Cursor, ScanGeometry};
use crate::memory::{PhysicalMemory, Region};
use crate::snapshot::Histogram;

/// What happened to the candidates examined in one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    /// Block positions visited.
    pub candidates: u64,
    /// No resident page at the position.
    pub absent: u64,
    /// Resident, but not an eligible large block.
    pub ineligible: u64,
    /// Eligible, but classification or bucketing was not applicable.
    pub not_applicable: u64,
    /// Counted into the live histogram.
    pub classified: u64,
}

impl ChunkOutcome {
    pub fn skipped(&self) -> u64 {
        self.absent + self.ineligible + self.not_applicable
    }

    /// Folds another chunk's counters into this one.
    pub fn add(&mut self, other: &ChunkOutcome) {
        self.candidates += other.candidates;
        self.absent += other.absent;
        self.ineligible += other.ineligible;
        self.not_applicable += other.not_applicable;
        self.classified += other.classified;
    }
}

/// Examines up to `geometry.scan_chunk` block positions starting at
/// `cursor`, never crossing `region.end`, and records each classified block
/// into `live`. The cursor advances by one block per candidate, skipped or
/// not.
pub fn scan_chunk(
    memory: &dyn PhysicalMemory,
    geometry: &ScanGeometry,
    region: &Region,
    cursor: &mut Cursor,
    live: &mut Histogram,
    page: &mut Vec<u8>,
) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();

    for _ in 0..geometry.scan_chunk {
        let pfn = cursor.pfn;
        if pfn >= region.end {
            break;
        }
        cursor.pfn += geometry.block_pages;
        outcome.candidates += 1;

        let Some(resident) = memory.resident_page_at(pfn) else {
            outcome.absent += 1;
            continue;
        };

        let block = memory.eligible_large_block(resident);
        if block.is_none() {
            outcome.ineligible += 1;
            continue;
        }

        let utilized = count_utilized(memory, block, geometry, page);
        let bucket = utilized.and_then(|u| bucket_for(geometry, u as i64));
        match (utilized, bucket) {
            (Some(utilized), Some(bucket)) => {
                live.record(bucket, geometry.block_pages - utilized);
                outcome.classified += 1;
                trace!("pfn {}: utilized {} -> bucket {}", pfn, utilized, bucket);
            }
            _ => {
                outcome.not_applicable += 1;
                trace!("pfn {}: classification not applicable", pfn);
            }
        }
    }

    outcome
}
