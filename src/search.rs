//! Searching sorted coordinate arrays.
use std::cmp::Ordering;
use std::ops::Range;

use num_traits::Float;

/// Find the insertion point for `q` in the sorted `array`
pub fn binsearch<T: Float>(array: &[T], q: T) -> usize {
    match array.binary_search_by(|x| x.partial_cmp(&q).unwrap_or(Ordering::Less)) {
        Ok(i) => i,
        Err(i) => i,
    }
}

/// Find the index of the value in `vec` closest to `target_val`.
///
/// Values outside the array's range resolve to the first or last index.
/// Ties resolve to the lower index.
pub fn nearest<T: Float>(vec: &[T], target_val: T) -> usize {
    let n = vec.len().saturating_sub(1);
    if vec.is_empty() || target_val <= vec[0] {
        return 0;
    } else if target_val >= vec[n] {
        return n;
    }
    let i = binsearch(vec, target_val);
    // vec[i - 1] < target_val <= vec[i]
    if (target_val - vec[i - 1]) <= (vec[i] - target_val) {
        i - 1
    } else {
        i
    }
}

/// The half-open index range of the values of `array` that fall inside
/// the closed interval `[lo, hi]`. The range is empty when nothing does.
pub fn find_between<T: Float>(array: &[T], lo: T, hi: T) -> Range<usize> {
    let start = array.partition_point(|x| *x < lo);
    let end = array.partition_point(|x| *x <= hi);
    if end < start {
        start..start
    } else {
        start..end
    }
}

/// Check if the values in `it` are strictly increasing
pub fn is_strictly_increasing<F: Float>(it: &[F]) -> bool {
    it.windows(2).all(|w| w[0] < w[1])
}
