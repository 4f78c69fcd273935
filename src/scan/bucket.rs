//! Utilization bucketing.
//!
//! Buckets are approximately equal-width fractions of the block size. The
//! last bucket absorbs the rounding remainder so a fully utilized block
//! always lands in it.

use super::ScanGeometry;

/// Maps a utilization count to a bucket index.
///
/// Returns `None` when `utilized` is negative or larger than the block.
pub fn bucket_for(geometry: &ScanGeometry, utilized: i64) -> Option<usize> {
    if utilized < 0 || utilized as u64 > geometry.block_pages {
        return None;
    }
    let bucket = utilized as u64 * geometry.bucket_count as u64 / geometry.block_pages;
    Some((bucket as usize).min(geometry.bucket_count - 1))
}

/// Inclusive `(start, end)` utilization range displayed for bucket `index`.
///
/// The final bucket's end is the block size itself so the displayed ranges
/// jointly cover `[0, block_pages]`.
pub fn bucket_range(geometry: &ScanGeometry, index: usize) -> (u64, u64) {
    let count = geometry.bucket_count as u64;
    let i = index as u64;
    let start = i * geometry.block_pages / count;
    let end = if index + 1 == geometry.bucket_count {
        geometry.block_pages
    } else {
        ((i + 1) * geometry.block_pages / count).saturating_sub(1)
    };
    (start, end)
}
