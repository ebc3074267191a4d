use crate::core::model::{ByteRange, Strategy};
use crate::core::policy::{SINGLE_SHOT_THRESHOLD, WORKER_COUNT};

pub fn choose_strategy(total: u64) -> Strategy {
    if total <= SINGLE_SHOT_THRESHOLD {
        Strategy::SingleShot
    } else {
        Strategy::Chunked(plan_ranges(total, WORKER_COUNT))
    }
}

/// Splits `[0, total - 1]` into `parts` contiguous ranges. Every range gets
/// `total / parts` bytes and the last one also takes the remainder.
///
/// `parts` is clamped to `total` so no range is ever empty; zero parts or a
/// zero-byte total yields no ranges.
pub fn plan_ranges(total: u64, parts: u64) -> Vec<ByteRange> {
    let parts = parts.min(total);
    if parts == 0 {
        return Vec::new();
    }
    let part_size = total / parts;
    (0..parts)
        .map(|i| {
            let start = i * part_size;
            let end = if i == parts - 1 { total - 1 } else { start + part_size - 1 };
            ByteRange { start, end }
        })
        .collect()
}
