//! Physical memory access seam.
//!
//! The scan engine never touches memory directly. Everything it needs
//! (region enumeration, residency, large-block eligibility and raw unit
//! content) comes through the [`PhysicalMemory`] trait:
//! - `synthetic`: an in-memory layout used for tests and `--test-data-file` runs
//! - `linux`: `/proc/zoneinfo`, `/proc/kpageflags` and `/dev/mem` on a live host

pub mod linux;
pub mod synthetic;

use serde::{Deserialize, Serialize};
use std::io;

use crate::error::SamplerError;

pub use linux::LinuxMemory;
pub use synthetic::{SyntheticBlock, SyntheticLayout, SyntheticMemory, SyntheticNode, SyntheticRegion};

/// A contiguous span of base units (page frame numbers), end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: u64,
    pub end: u64,
    pub manageable: bool,
}

impl Region {
    pub fn new(start: u64, end: u64, manageable: bool) -> Self {
        Self {
            start,
            end,
            manageable,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The ordered region list owned by one memory node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegions {
    pub node: u32,
    pub regions: Vec<Region>,
}

/// A resident base unit found at a given frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    pub pfn: u64,
}

/// A large composite block eligible for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    pub head_pfn: u64,
    pub pages: u64,
}

/// Capabilities the scan engine consumes from the platform.
pub trait PhysicalMemory: Send + Sync {
    /// Short name used in logs and on the landing page.
    fn name(&self) -> &'static str;

    /// Ordered node lists, each with its ordered regions.
    fn nodes(&self) -> Result<Vec<NodeRegions>, SamplerError>;

    fn resident_page_at(&self, pfn: u64) -> Option<PageHandle>;

    /// Returns a block handle only for content-bearing, block-aligned,
    /// composite-large units.
    fn eligible_large_block(&self, page: PageHandle) -> Option<BlockHandle>;

    /// Fills `buf` (exactly `page_size()` bytes) with the raw content of
    /// unit `index` of `block`.
    fn read_unit(&self, block: BlockHandle, index: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Size in bytes of one base unit.
    fn page_size(&self) -> usize;
}
