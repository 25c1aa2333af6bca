//! Trade level validation: ATR-bounded stops and minimum level separation

use serde::{Deserialize, Serialize};

use crate::indicators::last_atr;
use crate::{Direction, PatternType, OHLCV};

/// `|tp - entry| / |sl - entry|` rounded to two decimals; 0 when stop equals entry.
pub fn risk_reward_ratio(entry: f64, take_profit: f64, stop_loss: f64) -> f64 {
    let risk = (stop_loss - entry).abs();
    if risk == 0.0 {
        return 0.0;
    }
    ((take_profit - entry).abs() / risk * 100.0).round() / 100.0
}

/// Side of the entry a pattern's stop is clamped on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopBound {
    /// Stop sits above entry, capped at recent high + buffer
    Above,
    /// Stop sits below entry, floored at recent low - buffer
    Below,
}

fn stop_bound(pattern_type: PatternType, direction: Direction) -> Option<StopBound> {
    match pattern_type {
        t if t.is_top_family() => Some(StopBound::Above),
        t if t.is_bottom_family() => Some(StopBound::Below),
        PatternType::HeadAndShoulders => Some(match direction {
            Direction::Bearish => StopBound::Above,
            Direction::Bullish => StopBound::Below,
        }),
        _ => None,
    }
}

/// ATR-based sanity pass over detector levels.
///
/// Stops of top/bottom patterns are kept within `stop_buffer_atr` ATRs of the
/// extreme of the last `recent_bars` bars, and both stop and target are kept
/// at least `min_distance_atr` ATRs away from entry. A stop that ends up on the
/// reward side of entry is reset to `min_distance_atr` ATRs on the risk side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceLevelValidator {
    pub atr_period: usize,
    pub recent_bars: usize,
    pub stop_buffer_atr: f64,
    pub min_distance_atr: f64,
}

impl Default for PriceLevelValidator {
    fn default() -> Self {
        Self {
            atr_period: 14,
            recent_bars: 10,
            stop_buffer_atr: 1.0,
            min_distance_atr: 0.5,
        }
    }
}

impl PriceLevelValidator {
    /// Returns adjusted `(entry, take_profit, stop_loss)`. Entry is never moved;
    /// without a defined ATR every level passes through unchanged.
    pub fn validate<T: OHLCV>(
        &self,
        bars: &[T],
        entry: f64,
        take_profit: f64,
        stop_loss: f64,
        pattern_type: PatternType,
        direction: Direction,
    ) -> (f64, f64, f64) {
        let atr = match last_atr(bars, self.atr_period) {
            Some(atr) if atr.is_finite() => atr,
            _ => return (entry, take_profit, stop_loss),
        };

        let recent = &bars[bars.len().saturating_sub(self.recent_bars)..];
        let buffer = self.stop_buffer_atr * atr;
        let mut stop = stop_loss;
        match stop_bound(pattern_type, direction) {
            Some(StopBound::Above) => {
                let high = recent.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
                stop = stop.min(high + buffer);
            }
            Some(StopBound::Below) => {
                let low = recent.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
                stop = stop.max(low - buffer);
            }
            None => {}
        }

        let min_distance = self.min_distance_atr * atr;
        let risk_side = -direction.sign();
        // a cap or floor past entry lands the stop on the reward side
        if (stop - entry) * risk_side < 0.0 {
            stop = entry;
        }
        let stop = keep_distance(entry, stop, min_distance, risk_side);
        let target = keep_distance(entry, take_profit, min_distance, direction.sign());

        if stop != stop_loss || target != take_profit {
            tracing::trace!(
                "{} levels adjusted (atr {:.4}): stop {:.4} -> {:.4}, target {:.4} -> {:.4}",
                pattern_type,
                atr,
                stop_loss,
                stop,
                take_profit,
                target
            );
        }
        (entry, target, stop)
    }
}

/// Push `level` to `min_distance` from `entry` on its own side; `fallback_side`
/// (+1 above, -1 below) decides when the level sits on entry.
fn keep_distance(entry: f64, level: f64, min_distance: f64, fallback_side: f64) -> f64 {
    if (level - entry).abs() >= min_distance {
        return level;
    }
    let side = if level > entry {
        1.0
    } else if level < entry {
        -1.0
    } else {
        fallback_side
    };
    entry + side * min_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    /// 30 bars with constant range 2.0 around 100, so ATR == 2.0
    fn steady_bars() -> Vec<Bar> {
        (0..30)
            .map(|i| Bar::new(i, 100.0, 101.0, 99.0, 100.0, 1000.0))
            .collect()
    }

    #[test]
    fn test_risk_reward() {
        assert_eq!(risk_reward_ratio(100.0, 110.0, 95.0), 2.0);
        assert_eq!(risk_reward_ratio(100.0, 90.0, 103.0), 3.33);
        assert_eq!(risk_reward_ratio(100.0, 110.0, 100.0), 0.0);
    }

    #[test]
    fn test_top_stop_capped() {
        let v = PriceLevelValidator::default();
        // recent high 101 + ATR 2 = 103
        let (entry, tp, sl) = v.validate(
            &steady_bars(),
            98.0,
            90.0,
            120.0,
            PatternType::DoubleTop,
            Direction::Bearish,
        );
        assert_eq!(entry, 98.0);
        assert_eq!(tp, 90.0);
        assert!((sl - 103.0).abs() < 1e-9);
    }

    #[test]
    fn test_bottom_stop_floored() {
        let v = PriceLevelValidator::default();
        // recent low 99 - ATR 2 = 97
        let (_, _, sl) = v.validate(
            &steady_bars(),
            102.0,
            110.0,
            80.0,
            PatternType::TripleBottom,
            Direction::Bullish,
        );
        assert!((sl - 97.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_head_and_shoulders_uses_floor() {
        let v = PriceLevelValidator::default();
        let (_, _, sl) = v.validate(
            &steady_bars(),
            102.0,
            110.0,
            80.0,
            PatternType::HeadAndShoulders,
            Direction::Bullish,
        );
        assert!((sl - 97.0).abs() < 1e-9);
    }

    #[test]
    fn test_floor_above_entry_resets_stop_below() {
        let v = PriceLevelValidator::default();
        // rallied to 130: recent low 129 - ATR 2 = 127 sits above entry
        let bars: Vec<Bar> = (0..30)
            .map(|i| Bar::new(i, 130.0, 131.0, 129.0, 130.0, 1000.0))
            .collect();
        let (entry, tp, sl) = v.validate(
            &bars,
            112.5,
            131.5,
            94.5,
            PatternType::HeadAndShoulders,
            Direction::Bullish,
        );
        assert_eq!(entry, 112.5);
        assert_eq!(tp, 131.5);
        assert!((sl - 111.5).abs() < 1e-9);
        assert!(risk_reward_ratio(entry, tp, sl) > 0.0);
    }

    #[test]
    fn test_cap_below_entry_resets_stop_above() {
        let v = PriceLevelValidator::default();
        // fell to 80: recent high 81 + ATR 2 = 83 sits below entry
        let bars: Vec<Bar> = (0..30)
            .map(|i| Bar::new(i, 80.0, 81.0, 79.0, 80.0, 1000.0))
            .collect();
        let (_, _, sl) = v.validate(
            &bars,
            95.0,
            75.0,
            110.0,
            PatternType::DoubleTop,
            Direction::Bearish,
        );
        assert!((sl - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_separation_enforced() {
        let v = PriceLevelValidator::default();
        let (entry, tp, sl) = v.validate(
            &steady_bars(),
            100.0,
            100.5,
            99.9,
            PatternType::BullFlag,
            Direction::Bullish,
        );
        assert_eq!(entry, 100.0);
        assert!((tp - 101.0).abs() < 1e-9);
        assert!((sl - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_on_entry_uses_direction_side() {
        let v = PriceLevelValidator::default();
        let (_, tp, sl) = v.validate(
            &steady_bars(),
            100.0,
            100.0,
            100.0,
            PatternType::RisingWedge,
            Direction::Bearish,
        );
        assert!((tp - 99.0).abs() < 1e-9);
        assert!((sl - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_series_passes_through() {
        let v = PriceLevelValidator::default();
        let bars = &steady_bars()[..5];
        let out = v.validate(
            bars,
            100.0,
            100.1,
            100.0,
            PatternType::DoubleTop,
            Direction::Bearish,
        );
        assert_eq!(out, (100.0, 100.1, 100.0));
    }
}
