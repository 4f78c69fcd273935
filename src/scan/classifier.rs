//! Large-block utilization classifier.

use tracing::trace;

use super::ScanGeometry;
use crate::memory::{BlockHandle, PhysicalMemory};

/// Counts the units of `block` whose content is not entirely zero.
///
/// Returns `None` (not applicable) when there is no block, when the block is
/// not exactly one large block in size, or when any unit cannot be read.
/// `page` is a scratch buffer reused across calls.
pub fn count_utilized(
    memory: &dyn PhysicalMemory,
    block: Option<BlockHandle>,
    geometry: &ScanGeometry,
    page: &mut Vec<u8>,
) -> Option<u64> {
    let block = block?;
    if block.pages != geometry.block_pages {
        trace!(
            "Block at pfn {} spans {} pages, expected {}",
            block.head_pfn,
            block.pages,
            geometry.block_pages
        );
        return None;
    }

    page.resize(memory.page_size(), 0);

    let mut utilized = geometry.block_pages;
    for index in 0..block.pages {
        if let Err(e) = memory.read_unit(block, index, page) {
            trace!(
                "Unit {} of block at pfn {} unreadable: {}",
                index,
                block.head_pfn,
                e
            );
            return None;
        }
        if is_zero_unit(page) {
            utilized -= 1;
        }
    }

    Some(utilized)
}

/// True when every byte of the unit is zero. Compares a word at a time.
fn is_zero_unit(bytes: &[u8]) -> bool {
    let mut words = bytes.chunks_exact(8);
    let tail = words.remainder();
    words.all(|chunk| {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        u64::from_ne_bytes(word) == 0
    }) && tail.iter().all(|&b| b == 0)
}
