use std::iter::Sum;

use num_traits::{Float, ToPrimitive};

/// Create an evenly spaced grid from `start` up to (but excluding) `end`
pub fn gridspace<T: Float + ToPrimitive>(start: T, end: T, step: T) -> Vec<T> {
    let distance = end - start;
    let steps = (distance / step).round().to_usize().unwrap_or_default();
    let mut result = Vec::with_capacity(steps);
    for i in 0..steps {
        result.push(start + T::from(i).unwrap_or_else(T::zero) * step);
    }
    result
}

/// Integrate `y` over `x` using the trapezoid rule
pub fn trapz<T: Float + Sum>(x: &[T], y: &[T]) -> T {
    let half = T::from(0.5).unwrap_or_else(T::zero);
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * half * (ys[1] + ys[0]))
        .sum()
}
