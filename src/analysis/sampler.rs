//! Stratified sampling over chunk indices.
//!
//! `[0, total)` is cut into `count` equal floating-point segments and one
//! index is drawn uniformly from each. Boundaries are deterministic; the
//! draws are not.

use std::ops::Range;

use rand::Rng;

/// Default number of chunks sampled per book.
pub const DEFAULT_SAMPLE_COUNT: usize = 5;

/// Segment `i` is `[floor(i * total / count), floor((i + 1) * total / count))`,
/// with the last segment ending exactly at `total`.
///
/// Segments may be empty when `count` is large relative to `total`.
pub fn segment_bounds(total: usize, count: usize) -> Vec<Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    let width = total as f64 / count as f64;
    (0..count)
        .map(|i| {
            let start = (i as f64 * width) as usize;
            let end = if i == count - 1 {
                total
            } else {
                ((i + 1) as f64 * width) as usize
            };
            start..end
        })
        .collect()
}

/// Pick up to `count` chunk indices covering the whole document.
///
/// With `total <= count` every index is returned in order. Otherwise one
/// random index per non-empty segment, ascending.
pub fn sample_indices<R: Rng + ?Sized>(total: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if total <= count {
        return (0..total).collect();
    }
    segment_bounds(total, count)
        .into_iter()
        .filter(|segment| segment.start < segment.end)
        .map(|segment| rng.gen_range(segment))
        .collect()
}
