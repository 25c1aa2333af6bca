//! Local extrema detection over a symmetric window

use serde::{Deserialize, Serialize};

/// Default half-window used to qualify a local extremum
pub const DEFAULT_EXTREMA_WINDOW: usize = 20;

/// Indices of local maxima and minima, both ascending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremaSet {
    pub maxima: Vec<usize>,
    pub minima: Vec<usize>,
}

impl ExtremaSet {
    pub fn is_empty(&self) -> bool {
        self.maxima.is_empty() && self.minima.is_empty()
    }

    /// Last `n` maxima, oldest first. `None` if fewer than `n` exist.
    pub fn last_maxima(&self, n: usize) -> Option<&[usize]> {
        self.maxima.len().checked_sub(n).map(|start| &self.maxima[start..])
    }

    /// Last `n` minima, oldest first. `None` if fewer than `n` exist.
    pub fn last_minima(&self, n: usize) -> Option<&[usize]> {
        self.minima.len().checked_sub(n).map(|start| &self.minima[start..])
    }
}

/// Find local extrema of `values`.
///
/// Index `i` is a maximum iff `values[i]` is strictly greater than every value in
/// `[i - window, i - 1]` and `[i + 1, i + window]`; minima use strictly less.
/// Only `window <= i < len - window` is eligible, so a series of length
/// `<= 2 * window` (or a zero window) yields empty sets.
pub fn find_extrema(values: &[f64], window: usize) -> ExtremaSet {
    let mut set = ExtremaSet::default();
    let len = values.len();
    if window == 0 || len <= 2 * window {
        return set;
    }

    for i in window..len - window {
        let v = values[i];
        let neighbours = values[i - window..i].iter().chain(&values[i + 1..=i + window]);

        let (mut is_max, mut is_min) = (true, true);
        for &other in neighbours {
            is_max &= v > other;
            is_min &= v < other;
            if !is_max && !is_min {
                break;
            }
        }

        if is_max {
            set.maxima.push(i);
        } else if is_min {
            set.minima.push(i);
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tent(len: usize, peak: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 - (i as f64 - peak as f64).abs())
            .collect()
    }

    #[test]
    fn test_single_peak() {
        let values = tent(61, 30);
        let set = find_extrema(&values, 20);
        assert_eq!(set.maxima, vec![30]);
        assert!(set.minima.is_empty());
    }

    #[test]
    fn test_single_trough() {
        let values: Vec<f64> = tent(61, 30).iter().map(|v| -v).collect();
        let set = find_extrema(&values, 20);
        assert!(set.maxima.is_empty());
        assert_eq!(set.minima, vec![30]);
    }

    #[test]
    fn test_short_series_is_empty() {
        let values = tent(40, 20);
        assert!(find_extrema(&values, 20).is_empty());
        assert!(find_extrema(&values, 0).is_empty());
        assert!(find_extrema(&[], 3).is_empty());
    }

    #[test]
    fn test_plateau_is_not_extremum() {
        let mut values = tent(41, 20);
        values[21] = values[20];
        let set = find_extrema(&values, 5);
        assert!(set.maxima.is_empty());
    }

    #[test]
    fn test_peak_outside_eligible_range() {
        // peak at index 3 but window 5 makes only 5..len-5 eligible
        let values = tent(30, 3);
        let set = find_extrema(&values, 5);
        assert!(set.maxima.is_empty());
    }

    #[test]
    fn test_oscillation_sorted_and_disjoint() {
        let values: Vec<f64> = (0..200)
            .map(|i| (i as f64 * std::f64::consts::PI / 20.0).sin())
            .collect();
        let set = find_extrema(&values, 5);
        assert!(!set.maxima.is_empty());
        assert!(!set.minima.is_empty());
        assert!(set.maxima.windows(2).all(|w| w[0] < w[1]));
        assert!(set.minima.windows(2).all(|w| w[0] < w[1]));
        assert!(set.maxima.iter().all(|i| !set.minima.contains(i)));
    }

    #[test]
    fn test_last_helpers() {
        let set = ExtremaSet {
            maxima: vec![10, 50, 90],
            minima: vec![30],
        };
        assert_eq!(set.last_maxima(2), Some(&[50, 90][..]));
        assert_eq!(set.last_minima(2), None);
    }
}
