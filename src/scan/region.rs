//! Region arena and scan cursor.
//!
//! Node lists are flattened once into a single ordered arena so that the
//! cursor is just an index plus a frame number, and moving past the last
//! region wraps back to the first with a modulo.

use crate::error::SamplerError;
use crate::memory::{NodeRegions, Region};

/// Rounds `pfn` up to the next multiple of `block_pages`.
pub fn align_up(pfn: u64, block_pages: u64) -> u64 {
    pfn.div_ceil(block_pages) * block_pages
}

/// Current scan position: an index into the [`RegionMap`] and a
/// block-aligned frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub region: usize,
    pub pfn: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArenaEntry {
    node: u32,
    region: Region,
}

/// Every region of every node in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    entries: Vec<ArenaEntry>,
}

impl RegionMap {
    /// Flattens node lists in order. Fails if there is nothing to scan.
    pub fn new(nodes: Vec<NodeRegions>) -> Result<Self, SamplerError> {
        let entries: Vec<ArenaEntry> = nodes
            .into_iter()
            .flat_map(|n| {
                let node = n.node;
                n.regions
                    .into_iter()
                    .map(move |region| ArenaEntry { node, region })
            })
            .collect();

        if entries.is_empty() {
            return Err(SamplerError::NoMemoryNodes);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn region(&self, index: usize) -> &Region {
        &self.entries[index].region
    }

    pub fn node_of(&self, index: usize) -> u32 {
        self.entries[index].node
    }

    pub fn manageable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.region.manageable).count()
    }

    /// Cursor at the first aligned frame of the first region.
    pub fn first_cursor(&self, block_pages: u64) -> Cursor {
        self.cursor_at(0, block_pages)
    }

    fn cursor_at(&self, index: usize, block_pages: u64) -> Cursor {
        Cursor {
            region: index,
            pfn: align_up(self.entries[index].region.start, block_pages),
        }
    }

    /// Moves `cursor` to the start of the next region. Returns `true` when
    /// the move wrapped from the last region back to the first, which marks
    /// the end of a sweep.
    pub fn advance(&self, cursor: &mut Cursor, block_pages: u64) -> bool {
        let next = (cursor.region + 1) % self.entries.len();
        *cursor = self.cursor_at(next, block_pages);
        next == 0
    }
}
