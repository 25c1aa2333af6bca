//! Series trend classification by majority vote

use serde::{Deserialize, Serialize};

use crate::indicators::{rolling_max, rolling_min, sma};
use crate::{PatternError, Result, OHLCV};

/// Overall trend of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Bullish,
    Bearish,
}

impl TrendLabel {
    #[inline]
    fn from_bool(bullish: bool) -> Self {
        if bullish {
            TrendLabel::Bullish
        } else {
            TrendLabel::Bearish
        }
    }
}

/// Three-vote trend classifier.
///
/// 1. short SMA above long SMA at the last bar
/// 2. more rising rolling highs than falling rolling lows
/// 3. last close above long SMA
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendClassifier {
    pub short_period: usize,
    pub long_period: usize,
    pub swing_window: usize,
}

impl Default for TrendClassifier {
    fn default() -> Self {
        Self {
            short_period: 20,
            long_period: 50,
            swing_window: 5,
        }
    }
}

impl TrendClassifier {
    /// Minimum number of bars for all three votes to be defined.
    pub fn min_bars(&self) -> usize {
        self.short_period.max(self.long_period).max(self.swing_window + 1)
    }

    pub fn classify<T: OHLCV>(&self, bars: &[T]) -> Result<TrendLabel> {
        let need = self.min_bars();
        if bars.len() < need {
            return Err(PatternError::InsufficientData {
                need,
                got: bars.len(),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();

        let last = closes.len() - 1;
        let short_ma = sma(&closes, self.short_period)[last];
        let long_ma = sma(&closes, self.long_period)[last];
        let (short_ma, long_ma) = match short_ma.zip(long_ma) {
            Some(pair) => pair,
            None => {
                return Err(PatternError::InsufficientData {
                    need,
                    got: bars.len(),
                })
            }
        };

        let ma_vote = TrendLabel::from_bool(short_ma > long_ma);

        let rising_highs = count_changes(&rolling_max(&highs, self.swing_window), |d| d > 0.0);
        let falling_lows = count_changes(&rolling_min(&lows, self.swing_window), |d| d < 0.0);
        let swing_vote = TrendLabel::from_bool(rising_highs > falling_lows);

        let price_vote = TrendLabel::from_bool(closes[last] > long_ma);

        let label = majority([ma_vote, swing_vote, price_vote]);
        tracing::trace!(
            "trend votes: ma={:?} swing={:?} ({} up / {} down) price={:?} -> {:?}",
            ma_vote,
            swing_vote,
            rising_highs,
            falling_lows,
            price_vote,
            label
        );
        Ok(label)
    }
}

/// Classify with the default 20/50/5 configuration.
pub fn classify_trend<T: OHLCV>(bars: &[T]) -> Result<TrendLabel> {
    TrendClassifier::default().classify(bars)
}

fn count_changes(series: &[Option<f64>], pred: impl Fn(f64) -> bool) -> usize {
    series
        .windows(2)
        .filter_map(|w| Some(w[1]? - w[0]?))
        .filter(|&d| pred(d))
        .count()
}

/// Most frequent label; ties go to the label seen first.
fn majority(votes: [TrendLabel; 3]) -> TrendLabel {
    let count = |label: TrendLabel| votes.iter().filter(|v| **v == label).count();
    votes
        .iter()
        .copied()
        .fold(votes[0], |best, v| if count(v) > count(best) { v } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn series(closes: impl Iterator<Item = f64>) -> Vec<Bar> {
        closes
            .enumerate()
            .map(|(i, c)| Bar::new(i as i64, c, c + 1.0, c - 1.0, c, 1000.0))
            .collect()
    }

    #[test]
    fn test_uptrend_is_bullish() {
        let bars = series((0..80).map(|i| 100.0 + i as f64));
        assert_eq!(classify_trend(&bars).unwrap(), TrendLabel::Bullish);
    }

    #[test]
    fn test_downtrend_is_bearish() {
        let bars = series((0..80).map(|i| 200.0 - i as f64));
        assert_eq!(classify_trend(&bars).unwrap(), TrendLabel::Bearish);
    }

    #[test]
    fn test_flat_is_bearish() {
        // no vote can be strictly bullish on a flat series
        let bars = series((0..60).map(|_| 100.0));
        assert_eq!(classify_trend(&bars).unwrap(), TrendLabel::Bearish);
    }

    #[test]
    fn test_short_series_rejected() {
        let bars = series((0..49).map(|i| 100.0 + i as f64));
        assert!(matches!(
            classify_trend(&bars),
            Err(PatternError::InsufficientData { need: 50, got: 49 })
        ));
    }

    #[test]
    fn test_majority_vote() {
        use TrendLabel::*;
        assert_eq!(majority([Bullish, Bearish, Bullish]), Bullish);
        assert_eq!(majority([Bullish, Bearish, Bearish]), Bearish);
        assert_eq!(majority([Bearish, Bearish, Bearish]), Bearish);
    }
}
