//! Common helper functions for chart pattern detection
//!
//! Column extraction, price-similarity checks and level pricing shared across
//! all detector modules.

use crate::{Direction, PatternType, PriceLevels, SeriesContext, OHLCV};

// ============================================================
// SHARED THRESHOLDS
// ============================================================

/// Bars needed before a default 20-bar extrema window can produce anything
pub const EXTREMA_MIN_BARS: usize = 2 * crate::extrema::DEFAULT_EXTREMA_WINDOW + 1;

/// Lookback of the momentum comparison between two peaks
pub const MOMENTUM_LOOKBACK: usize = 5;

// ============================================================
// COLUMNS
// ============================================================

#[inline]
pub fn highs<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.high()).collect()
}

#[inline]
pub fn lows<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.low()).collect()
}

#[inline]
pub fn closes<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.close()).collect()
}

/// Highest high of `bars`, `None` when empty.
pub fn max_high<T: OHLCV>(bars: &[T]) -> Option<f64> {
    bars.iter().map(|b| b.high()).reduce(f64::max)
}

/// Lowest low of `bars`, `None` when empty.
pub fn min_low<T: OHLCV>(bars: &[T]) -> Option<f64> {
    bars.iter().map(|b| b.low()).reduce(f64::min)
}

// ============================================================
// COMPARISONS
// ============================================================

/// `|a - b| / a < tolerance`. Never true for a zero reference.
#[inline]
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    a != 0.0 && ((a - b) / a).abs() < tolerance
}

/// All pairs of `values` within tolerance of each other.
pub fn all_within_tolerance(values: &[f64], tolerance: f64) -> bool {
    values.iter().enumerate().all(|(i, &a)| {
        values[i + 1..]
            .iter()
            .all(|&b| within_tolerance(a, b, tolerance))
    })
}

/// `values[index] - values[index - lookback]`, if the lookback fits.
#[inline]
pub fn momentum(values: &[f64], index: usize, lookback: usize) -> Option<f64> {
    let prev = values.get(index.checked_sub(lookback)?)?;
    Some(values.get(index)? - prev)
}

#[inline]
pub fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

#[inline]
pub fn strictly_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] > w[1])
}

// ============================================================
// LEVELS
// ============================================================

/// Route raw levels through the context's validator and price the trade.
pub fn validated_levels<T: OHLCV>(
    bars: &[T],
    ctx: &SeriesContext,
    pattern_type: PatternType,
    direction: Direction,
    entry: f64,
    take_profit: f64,
    stop_loss: f64,
) -> PriceLevels {
    let (entry, take_profit, stop_loss) = ctx.validator.validate(
        bars,
        entry,
        take_profit,
        stop_loss,
        pattern_type,
        direction,
    );
    PriceLevels::new(entry, take_profit, stop_loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(100.0, 101.5, 0.02));
        assert!(!within_tolerance(100.0, 103.0, 0.02));
        assert!(!within_tolerance(0.0, 0.0, 0.02));
        assert!(all_within_tolerance(&[100.0, 101.0, 99.5], 0.02));
        assert!(!all_within_tolerance(&[100.0, 101.0, 97.0], 0.02));
    }

    #[test]
    fn test_momentum() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0];
        assert_eq!(momentum(&values, 5, 5), Some(31.0));
        assert_eq!(momentum(&values, 4, 5), None);
        assert_eq!(momentum(&values, 9, 2), None);
    }

    #[test]
    fn test_monotonic() {
        assert!(strictly_increasing(&[1.0, 2.0, 3.0]));
        assert!(!strictly_increasing(&[1.0, 1.0, 3.0]));
        assert!(strictly_decreasing(&[3.0, 2.0, 1.0]));
        assert!(!strictly_decreasing(&[3.0, 2.0, 2.0]));
    }
}
