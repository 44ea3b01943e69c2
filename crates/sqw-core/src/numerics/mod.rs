//! Numeric helpers shared by the spectral containers: tolerance comparison,
//! compensated sums, discrete convolution and weighted re-histogramming.

/// True when `values` is monotonically non-decreasing.
pub fn is_sorted_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|window| window[0] <= window[1])
}

/// Index of the first out-of-order pair, if any.
pub fn first_unsorted_index(values: &[f64]) -> Option<usize> {
    values
        .windows(2)
        .position(|window| window[0] > window[1])
        .map(|index| index + 1)
}

/// Scalar closeness test: |lhs - rhs| <= abs_tol + rel_tol * |rhs|.
pub fn within_tolerance(lhs: f64, rhs: f64, abs_tol: f64, rel_tol: f64) -> bool {
    (lhs - rhs).abs() <= abs_tol + rel_tol * rhs.abs()
}

/// Elementwise closeness over two slices; false on length mismatch.
pub fn all_within_tolerance(lhs: &[f64], rhs: &[f64], abs_tol: f64, rel_tol: f64) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .zip(rhs)
            .all(|(&left, &right)| within_tolerance(left, right, abs_tol, rel_tol))
}

/// Closeness for optional scalars: both unset, or both set and close.
pub fn optional_within_tolerance(
    lhs: Option<f64>,
    rhs: Option<f64>,
    abs_tol: f64,
    rel_tol: f64,
) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(left), Some(right)) => within_tolerance(left, right, abs_tol, rel_tol),
        _ => false,
    }
}

/// The uniform spacing of `grid`, if every step matches the mean step within
/// tolerance. Grids shorter than two points have no spacing.
pub fn uniform_step(grid: &[f64], abs_tol: f64, rel_tol: f64) -> Option<f64> {
    if grid.len() < 2 {
        return None;
    }

    let step = (grid[grid.len() - 1] - grid[0]) / ((grid.len() - 1) as f64);
    grid.windows(2)
        .all(|window| within_tolerance(window[1] - window[0], step, abs_tol, rel_tol))
        .then_some(step)
}

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

/// Kahan-compensated sum.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// Full discrete convolution; the result has length
/// `signal.len() + kernel.len() - 1`. Empty inputs produce an empty result.
pub fn convolve_full(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }

    let mut result = vec![0.0; signal.len() + kernel.len() - 1];
    for (signal_index, &signal_value) in signal.iter().enumerate() {
        for (kernel_index, &kernel_value) in kernel.iter().enumerate() {
            result[signal_index + kernel_index] += signal_value * kernel_value;
        }
    }
    result
}

/// Midpoints of consecutive bin edges.
pub fn bin_midpoints(edges: &[f64]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|window| 0.5 * (window[0] + window[1]))
        .collect()
}

/// Accumulate `weights` into the bins defined by `edges`, by the position of
/// each sample. Bins are half-open except the last, which includes its upper
/// edge; samples outside the edges are dropped. Edges must be sorted.
pub fn histogram_accumulate(positions: &[f64], edges: &[f64], weights: &[f64]) -> Vec<f64> {
    let bin_count = edges.len().saturating_sub(1);
    let mut accumulated = vec![0.0; bin_count];
    if bin_count == 0 {
        return accumulated;
    }

    for (&position, &weight) in positions.iter().zip(weights) {
        if let Some(bin) = bin_index(position, edges) {
            accumulated[bin] += weight;
        }
    }
    accumulated
}

fn bin_index(position: f64, edges: &[f64]) -> Option<usize> {
    let last = edges.len() - 1;
    if position < edges[0] || position > edges[last] {
        return None;
    }
    if position == edges[last] {
        return Some(last - 1);
    }

    let upper = edges.partition_point(|&edge| edge <= position);
    Some(upper - 1)
}

#[cfg(test)]
mod tests {
    use super::{
        all_within_tolerance, bin_midpoints, convolve_full, first_unsorted_index,
        histogram_accumulate, is_sorted_ascending, optional_within_tolerance, stable_sum,
        uniform_step, within_tolerance,
    };

    #[test]
    fn sorted_checks_allow_repeated_values() {
        assert!(is_sorted_ascending(&[1.0, 1.0, 2.0]));
        assert!(!is_sorted_ascending(&[1.0, 3.0, 2.0]));
        assert_eq!(first_unsorted_index(&[1.0, 3.0, 2.0]), Some(2));
        assert_eq!(first_unsorted_index(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn tolerance_checks_accept_absolute_or_relative_match() {
        assert!(within_tolerance(10.0, 10.0 + 5.0e-8, 1.0e-8, 1.0e-5));
        assert!(!within_tolerance(1.0, 1.1, 1.0e-8, 1.0e-5));
        assert!(all_within_tolerance(
            &[1.0, 2.0],
            &[1.0, 2.0 + 1.0e-9],
            1.0e-8,
            1.0e-5
        ));
        assert!(!all_within_tolerance(&[1.0, 2.0], &[1.0], 1.0e-8, 1.0e-5));
    }

    #[test]
    fn optional_tolerance_requires_matching_presence() {
        assert!(optional_within_tolerance(None, None, 1.0e-8, 1.0e-5));
        assert!(optional_within_tolerance(
            Some(10.0),
            Some(10.0),
            1.0e-8,
            1.0e-5
        ));
        assert!(!optional_within_tolerance(Some(10.0), None, 1.0e-8, 1.0e-5));
        assert!(!optional_within_tolerance(
            Some(10.0),
            Some(20.0),
            1.0e-8,
            1.0e-5
        ));
    }

    #[test]
    fn uniform_step_detects_regular_and_irregular_grids() {
        assert_eq!(uniform_step(&[1.0, 2.0, 3.0, 4.0], 1.0e-8, 1.0e-5), Some(1.0));
        assert_eq!(uniform_step(&[1.0, 2.0, 4.0], 1.0e-8, 1.0e-5), None);
        assert_eq!(uniform_step(&[1.0], 1.0e-8, 1.0e-5), None);
    }

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        let input = [1.0e16, 1.0, -1.0e16];
        assert_eq!(stable_sum(&input), 0.0);
    }

    #[test]
    fn convolve_full_matches_hand_computed_result() {
        let result = convolve_full(&[1.0, 1.0], &[0.5, 0.5]);
        assert_eq!(result, vec![0.5, 1.0, 0.5]);

        let result = convolve_full(&[1.0, 2.0, 3.0], &[1.0]);
        assert_eq!(result, vec![1.0, 2.0, 3.0]);

        assert!(convolve_full(&[], &[1.0]).is_empty());
    }

    #[test]
    fn bin_midpoints_halve_consecutive_edges() {
        assert_eq!(bin_midpoints(&[0.0, 2.0, 4.0]), vec![1.0, 3.0]);
        assert!(bin_midpoints(&[0.0]).is_empty());
    }

    #[test]
    fn histogram_accumulate_bins_weights_by_position() {
        let positions = [0.0, 1.0, 2.0, 3.0];
        let weights = [1.0, 2.0, 3.0, 4.0];
        let accumulated = histogram_accumulate(&positions, &[0.0, 2.0, 4.0], &weights);
        assert_eq!(accumulated, vec![3.0, 7.0]);
    }

    #[test]
    fn histogram_accumulate_includes_upper_edge_and_drops_outliers() {
        let accumulated = histogram_accumulate(
            &[-1.0, 0.0, 4.0, 5.0],
            &[0.0, 2.0, 4.0],
            &[10.0, 1.0, 2.0, 20.0],
        );
        assert_eq!(accumulated, vec![1.0, 2.0]);
    }
}
