use std::ops::Range;

/// Default byte budget of one bulk-read batch (25 MiB).
pub const DEFAULT_BATCH_BYTES: u64 = 25 * 1024 * 1024;

/// Splits `[0, total)` into contiguous byte ranges of roughly `step` bytes,
/// cutting only at record offsets.
///
/// `offsets` must be sorted ascending. A running threshold starts at `step`;
/// whenever an offset exceeds it, the current batch is closed right before
/// that offset and the threshold moves up by `step`. The final batch always
/// runs to `total`. The batches never overlap, are ordered, and together cover
/// `[0, total)` exactly once. A `step` of `0` is treated as `1`.
pub fn partition_batches(offsets: &[u64], total: u64, step: u64) -> Vec<Range<u64>> {
    let step = step.max(1);
    let mut batches = Vec::new();
    let mut begin = 0;
    let mut threshold = step;
    for &offset in offsets {
        if offset > threshold && offset > begin {
            batches.push(begin..offset);
            begin = offset;
            threshold = threshold.saturating_add(step);
        }
    }
    batches.push(begin..total.max(begin));
    batches
}
