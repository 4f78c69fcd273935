//! Per-tick scan state machine.
//!
//! Each tick either advances the cursor to the next region (publishing a
//! snapshot when the advance wraps around) or scans one bounded chunk of
//! the current region. The engine owns the cursor and the live histogram
//! outright; only the published snapshot is shared.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{scan_chunk, ChunkOutcome, Cursor, RegionMap, ScanGeometry};
use crate::clock::Clock;
use crate::error::SamplerError;
use crate::memory::PhysicalMemory;
use crate::snapshot::{Histogram, Snapshot, SnapshotStore};

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Moved to region `region` without finishing a sweep.
    Advanced { region: usize },
    /// Finished sweep number `sweep` and published its snapshot.
    Published { sweep: u64 },
    /// Scanned one chunk of the current region.
    Scanned(ChunkOutcome),
}

pub struct ScanEngine {
    memory: Arc<dyn PhysicalMemory>,
    clock: Arc<dyn Clock>,
    geometry: ScanGeometry,
    regions: RegionMap,
    cursor: Cursor,
    live: Histogram,
    store: Arc<SnapshotStore>,
    last_sweep_end: Duration,
    sweeps: u64,
    page: Vec<u8>,
}

impl ScanEngine {
    /// Builds an engine positioned at the first region.
    ///
    /// Fails if the geometry is invalid or the memory source enumerates no
    /// regions at all.
    pub fn new(
        memory: Arc<dyn PhysicalMemory>,
        clock: Arc<dyn Clock>,
        geometry: ScanGeometry,
        store: Arc<SnapshotStore>,
    ) -> Result<Self, SamplerError> {
        geometry.validate()?;
        let regions = RegionMap::new(memory.nodes()?)?;
        let cursor = regions.first_cursor(geometry.block_pages);
        let last_sweep_end = clock.now();

        info!(
            "Scan engine ready: {} regions ({} manageable) from {} memory, {} pages per block",
            regions.len(),
            regions.manageable_count(),
            memory.name(),
            geometry.block_pages
        );

        Ok(Self {
            memory,
            clock,
            geometry,
            regions,
            cursor,
            live: Histogram::new(geometry.bucket_count),
            store,
            last_sweep_end,
            sweeps: 0,
            page: Vec::new(),
        })
    }

    /// Performs one tick of work.
    #[instrument(level = "debug", skip(self), fields(region = self.cursor.region, pfn = self.cursor.pfn))]
    pub fn tick(&mut self) -> TickOutcome {
        let region = *self.regions.region(self.cursor.region);

        if !region.manageable || self.cursor.pfn >= region.end {
            return self.advance();
        }

        let outcome = scan_chunk(
            self.memory.as_ref(),
            &self.geometry,
            &region,
            &mut self.cursor,
            &mut self.live,
            &mut self.page,
        );
        debug!(
            "Scanned {} candidates, classified {}, skipped {}",
            outcome.candidates,
            outcome.classified,
            outcome.skipped()
        );
        TickOutcome::Scanned(outcome)
    }

    /// Ticks until the current sweep is published. Returns the number of
    /// ticks it took.
    pub fn run_sweep(&mut self) -> u64 {
        let mut ticks = 0;
        loop {
            ticks += 1;
            if let TickOutcome::Published { .. } = self.tick() {
                return ticks;
            }
        }
    }

    fn advance(&mut self) -> TickOutcome {
        let wrapped = self
            .regions
            .advance(&mut self.cursor, self.geometry.block_pages);
        if !wrapped {
            debug!(
                "Advanced to region {} on node {}",
                self.cursor.region,
                self.regions.node_of(self.cursor.region)
            );
            return TickOutcome::Advanced {
                region: self.cursor.region,
            };
        }

        self.publish();
        self.refresh_regions();
        TickOutcome::Published { sweep: self.sweeps }
    }

    fn publish(&mut self) {
        let now = self.clock.now();
        let duration = now.saturating_sub(self.last_sweep_end);
        self.last_sweep_end = now;
        self.sweeps += 1;

        let snapshot = Snapshot {
            buckets: self.live.buckets().to_vec(),
            last_scan_time: now,
            last_scan_duration: duration,
            sweeps: self.sweeps,
        };
        info!(
            "Sweep {} complete: {} large blocks classified in {:.2}s",
            self.sweeps,
            snapshot.total_blocks(),
            duration.as_secs_f64()
        );

        self.store.publish(snapshot);
        self.live.reset();
    }

    /// Re-enumerates regions between sweeps so memory that came or went
    /// during the last sweep is picked up. Keeps the old map on failure.
    fn refresh_regions(&mut self) {
        match self.memory.nodes().and_then(RegionMap::new) {
            Ok(regions) => {
                if regions != self.regions {
                    info!(
                        "Region layout changed: {} -> {} regions",
                        self.regions.len(),
                        regions.len()
                    );
                    self.regions = regions;
                    self.cursor = self.regions.first_cursor(self.geometry.block_pages);
                }
            }
            Err(e) => warn!("Keeping previous region layout: {}", e),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn live(&self) -> &Histogram {
        &self.live
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    pub fn memory_name(&self) -> &'static str {
        self.memory.name()
    }
}
