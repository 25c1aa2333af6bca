//! Post-formation retest tracking of a pattern's key level

use serde::{Deserialize, Serialize};

use crate::{Direction, PatternCandidate, PatternType, RetestStatus, OHLCV};

/// Kind of level a pattern is retested against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneFamily {
    /// Head & shoulders neckline
    Neckline,
    /// Broken support of a top pattern, retested from below
    Resistance,
    /// Broken resistance of a bottom pattern, retested from above
    Support,
    /// Triangle, wedge and flag boundaries
    Breakout,
}

impl ZoneFamily {
    pub fn of(pattern_type: PatternType) -> Self {
        match pattern_type {
            PatternType::HeadAndShoulders => ZoneFamily::Neckline,
            t if t.is_top_family() => ZoneFamily::Resistance,
            t if t.is_bottom_family() => ZoneFamily::Support,
            _ => ZoneFamily::Breakout,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ZoneFamily::Neckline => "neckline",
            ZoneFamily::Resistance => "resistance",
            ZoneFamily::Support => "support",
            ZoneFamily::Breakout => "breakout",
        }
    }
}

/// Which bar column is measured and which side of the zone means failure
#[derive(Debug, Clone, Copy)]
enum Probe {
    /// Max high; failed above the zone
    HighFailsAbove,
    /// Min low; failed below the zone
    LowFailsBelow,
    /// Last close; failed beyond the zone on the given side
    Close { fails_above: bool },
}

/// Classifies the last `lookback` bars against a `zone_pct` band around entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetestTracker {
    pub zone_pct: f64,
    pub lookback: usize,
}

impl Default for RetestTracker {
    fn default() -> Self {
        Self {
            zone_pct: 0.01,
            lookback: 5,
        }
    }
}

impl RetestTracker {
    /// Recompute the retest fields of `candidate` from `bars`.
    ///
    /// Candidates without levels, or an empty slice, end with status `none`.
    pub fn check<T: OHLCV>(&self, candidate: &mut PatternCandidate, bars: &[T]) {
        candidate.retest_status = RetestStatus::None;
        candidate.retest_price = None;
        candidate.retest_description = None;

        let Some(levels) = candidate.levels else {
            return;
        };
        if bars.is_empty() {
            return;
        }

        let reference = levels.entry_price;
        let a = reference * (1.0 - self.zone_pct);
        let b = reference * (1.0 + self.zone_pct);
        let (lower, upper) = (a.min(b), a.max(b));

        let recent = &bars[bars.len().saturating_sub(self.lookback.max(1))..];
        let family = ZoneFamily::of(candidate.pattern_type);
        let probe = match (family, candidate.direction) {
            (ZoneFamily::Neckline, Direction::Bearish) | (ZoneFamily::Resistance, _) => {
                Probe::HighFailsAbove
            }
            (ZoneFamily::Neckline, Direction::Bullish) | (ZoneFamily::Support, _) => {
                Probe::LowFailsBelow
            }
            (ZoneFamily::Breakout, dir) => Probe::Close {
                fails_above: dir.is_bearish(),
            },
        };

        let (measured, column, failed) = match probe {
            Probe::HighFailsAbove => {
                let high = recent.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
                (high, "high", high > upper)
            }
            Probe::LowFailsBelow => {
                let low = recent.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
                (low, "low", low < lower)
            }
            Probe::Close { fails_above } => {
                let close = recent[recent.len() - 1].close();
                let failed = if fails_above {
                    close > upper
                } else {
                    close < lower
                };
                (close, "close", failed)
            }
        };

        let zone = format!("{} zone {:.2}-{:.2}", family.label(), lower, upper);
        let (status, description) = if (lower..=upper).contains(&measured) {
            candidate.retest_price = Some(measured);
            (
                RetestStatus::Confirmed,
                format!("Price retested {} ({} {:.2})", zone, column, measured),
            )
        } else if failed {
            (
                RetestStatus::Failed,
                format!("Price broke through {} ({} {:.2})", zone, column, measured),
            )
        } else {
            (
                RetestStatus::Pending,
                format!("Waiting for retest of {} ({} {:.2})", zone, column, measured),
            )
        };

        candidate.retest_status = status;
        candidate.retest_description = Some(description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, PriceLevels};

    fn candidate(pattern_type: PatternType, direction: Direction, entry: f64) -> PatternCandidate {
        PatternCandidate::new(pattern_type, direction, 0.8, entry, String::new())
            .with_levels(Some(PriceLevels::new(entry, entry - 10.0, entry - 1.0)))
    }

    fn bars_with_highs(highs: &[f64]) -> Vec<Bar> {
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| Bar::new(i as i64, h - 1.0, h, h - 2.0, h - 1.0, 1000.0))
            .collect()
    }

    #[test]
    fn test_resistance_confirmed() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::DoubleTop, Direction::Bearish, 100.0);
        let bars = bars_with_highs(&[97.0, 98.0, 100.3, 99.0, 98.5]);
        tracker.check(&mut c, &bars);
        assert_eq!(c.retest_status, RetestStatus::Confirmed);
        assert_eq!(c.retest_price, Some(100.3));
        assert!(c.retest_description.is_some());
    }

    #[test]
    fn test_resistance_failed_and_pending() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::TripleTop, Direction::Bearish, 100.0);
        tracker.check(&mut c, &bars_with_highs(&[99.0, 102.0, 99.5]));
        assert_eq!(c.retest_status, RetestStatus::Failed);
        assert_eq!(c.retest_price, None);

        tracker.check(&mut c, &bars_with_highs(&[96.0, 97.0, 95.0]));
        assert_eq!(c.retest_status, RetestStatus::Pending);
    }

    #[test]
    fn test_support_uses_lows() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::DoubleBottom, Direction::Bullish, 100.0);
        // lows are high - 2
        tracker.check(&mut c, &bars_with_highs(&[104.0, 101.5, 103.0]));
        assert_eq!(c.retest_status, RetestStatus::Confirmed);
        assert_eq!(c.retest_price, Some(99.5));

        tracker.check(&mut c, &bars_with_highs(&[100.0, 97.0]));
        assert_eq!(c.retest_status, RetestStatus::Failed);
    }

    #[test]
    fn test_inverse_neckline_fails_below() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::HeadAndShoulders, Direction::Bullish, 100.0);
        tracker.check(&mut c, &bars_with_highs(&[100.0, 96.0]));
        assert_eq!(c.retest_status, RetestStatus::Failed);

        let mut c = candidate(PatternType::HeadAndShoulders, Direction::Bearish, 100.0);
        tracker.check(&mut c, &bars_with_highs(&[100.0, 96.0]));
        assert_eq!(c.retest_status, RetestStatus::Confirmed);
    }

    #[test]
    fn test_breakout_uses_last_close() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::BullFlag, Direction::Bullish, 100.0);
        // closes are high - 1
        tracker.check(&mut c, &bars_with_highs(&[110.0, 101.0]));
        assert_eq!(c.retest_status, RetestStatus::Confirmed);

        tracker.check(&mut c, &bars_with_highs(&[100.0, 95.0]));
        assert_eq!(c.retest_status, RetestStatus::Failed);

        tracker.check(&mut c, &bars_with_highs(&[100.0, 110.0]));
        assert_eq!(c.retest_status, RetestStatus::Pending);
    }

    #[test]
    fn test_without_levels_stays_none() {
        let tracker = RetestTracker::default();
        let mut c = PatternCandidate::new(
            PatternType::RisingWedge,
            Direction::Bearish,
            0.8,
            100.0,
            String::new(),
        );
        tracker.check(&mut c, &bars_with_highs(&[100.0]));
        assert_eq!(c.retest_status, RetestStatus::None);
        assert_eq!(c.retest_description, None);

        let mut c = candidate(PatternType::DoubleTop, Direction::Bearish, 100.0);
        tracker.check(&mut c, &Vec::<Bar>::new());
        assert_eq!(c.retest_status, RetestStatus::None);
    }

    #[test]
    fn test_idempotent() {
        let tracker = RetestTracker::default();
        let bars = bars_with_highs(&[97.0, 98.0, 100.3, 99.0, 98.5]);
        let mut once = candidate(PatternType::DoubleTop, Direction::Bearish, 100.0);
        tracker.check(&mut once, &bars);
        let mut twice = once.clone();
        tracker.check(&mut twice, &bars);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_only_lookback_bars_count() {
        let tracker = RetestTracker::default();
        let mut c = candidate(PatternType::DoubleTop, Direction::Bearish, 100.0);
        let bars = bars_with_highs(&[120.0, 96.0, 96.0, 96.0, 96.0, 96.0]);
        tracker.check(&mut c, &bars);
        assert_eq!(c.retest_status, RetestStatus::Pending);
    }
}
