/*!
 * Window-function helpers used by the report engines
 *
 * Rankings operate on slices that the caller has already sorted into
 * ranking order; they return one 1-based rank per element.
 */

/// Round to `places` decimal places, halves away from zero.
///
/// `round_to(0.125, 2) == 0.13`, `round_to(-0.125, 2) == -0.13`.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    // normalise -0.0
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Row-number ranking: 1, 2, 3, ... regardless of ties.
pub fn row_numbers(len: usize) -> Vec<usize> {
    (1..=len).collect()
}

/// Dense ranking: equal keys share a rank, the next distinct key gets the
/// following rank with no gaps.
pub fn dense_ranks<T, K, F>(sorted: &[T], key: F) -> Vec<usize>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut ranks = Vec::with_capacity(sorted.len());
    let mut previous: Option<K> = None;
    let mut rank = 0;

    for item in sorted {
        let current = key(item);
        if previous.as_ref() != Some(&current) {
            rank += 1;
        }
        ranks.push(rank);
        previous = Some(current);
    }

    ranks
}

/// Arithmetic mean, `None` for an empty input
pub fn mean(sum: f64, count: u64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(0.25, 1), 0.3);
        assert_eq!(round_to(-0.25, 1), -0.3);
        assert_eq!(round_to(10.0, 2), 10.0);
        assert_eq!(round_to(1.23456, 2), 1.23);
    }

    #[test]
    fn test_round_never_yields_negative_zero() {
        let r = round_to(-0.001, 2);
        assert_eq!(r, 0.0);
        assert!(r.is_sign_positive());
    }

    #[test]
    fn test_row_numbers_ignore_ties() {
        assert_eq!(row_numbers(3), vec![1, 2, 3]);
        assert!(row_numbers(0).is_empty());
    }

    #[test]
    fn test_dense_ranks_share_ties_without_gaps() {
        let sorted = [30, 30, 30, 20, 10, 10, 5];
        assert_eq!(dense_ranks(&sorted, |q| *q), vec![1, 1, 1, 2, 3, 3, 4]);
    }

    #[test]
    fn test_mean_of_empty_group() {
        assert_eq!(mean(0.0, 0), None);
        assert_eq!(mean(9.0, 3), Some(3.0));
    }
}
