//! Triangle detector (symmetric, ascending, descending)

use std::collections::HashMap;

use super::helpers::{highs, lows, validated_levels};
use crate::{
    indicators::{linear_fit, mean, LineFit},
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Period, Ratio, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(TriangleDetector);

/// Converging least-squares lines through the highs and lows of the last
/// `lookback` bars.
///
/// Slopes are normalized by the mean price of the window, so `flat_slope` is
/// a fraction of price per bar.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TriangleDetector {
    pub lookback: Period,
    /// Normalized slopes within ±flat_slope count as horizontal
    pub flat_slope: Ratio,
    /// Apex must lie within `apex_horizon × lookback` bars of the window start
    pub apex_horizon: Period,
    /// Range compression above this adds to confidence
    pub min_compression: Ratio,
}

impl Default for TriangleDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(30),
            flat_slope: Ratio::new_const(1e-4),
            apex_horizon: Period::new_const(2),
            min_compression: Ratio::new_const(0.2),
        }
    }
}

/// Triangle shape from normalized slopes; `None` for non-triangles.
fn classify(high_slope: f64, low_slope: f64, eps: f64) -> Option<PatternType> {
    let falling_highs = high_slope < -eps;
    let rising_lows = low_slope > eps;
    if falling_highs && rising_lows {
        Some(PatternType::SymmetricTriangle)
    } else if falling_highs && low_slope.abs() < eps {
        Some(PatternType::DescendingTriangle)
    } else if high_slope.abs() < eps && rising_lows {
        Some(PatternType::AscendingTriangle)
    } else {
        None
    }
}

impl PatternDetector for TriangleDetector {
    fn id(&self) -> PatternId {
        PatternId("triangle")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::TrendLine
    }

    fn min_bars(&self) -> usize {
        self.lookback.get()
    }

    fn validate_config(&self) -> Result<()> {
        if self.lookback.get() < 3 {
            return Err(PatternError::InvalidConfig("lookback must be >= 3".into()));
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let n = self.lookback.get();
        if bars.len() < n {
            return None;
        }
        let window = &bars[bars.len() - n..];
        let highs = highs(window);
        let lows = lows(window);

        let upper = linear_fit(&highs)?;
        let lower = linear_fit(&lows)?;
        let scale = mean(&highs).zip(mean(&lows)).map(|(h, l)| (h + l) / 2.0)?;
        if scale <= 0.0 {
            return None;
        }

        let eps = self.flat_slope.get();
        let (hs, ls) = (upper.slope / scale, lower.slope / scale);
        if (hs - ls).abs() <= eps {
            return None;
        }
        let apex_x = upper.intersect_x(&lower, 0.0)?;
        let horizon = (self.apex_horizon.get() * n) as f64;
        if !(apex_x > 0.0 && apex_x < horizon) {
            tracing::debug!(
                "[{}] apex at {:.1} outside (0, {})",
                self.id().as_str(),
                apex_x,
                horizon
            );
            return None;
        }

        let pattern_type = classify(hs, ls, eps)?;
        let apex_price = upper.at(apex_x);
        let last_close = bars.last()?.close();
        let direction = match pattern_type {
            PatternType::AscendingTriangle => Direction::Bullish,
            PatternType::DescendingTriangle => Direction::Bearish,
            _ if last_close > apex_price => Direction::Bullish,
            _ => Direction::Bearish,
        };

        let initial_range = highs[0] - lows[0];
        let final_range = highs[n - 1] - lows[n - 1];
        let compression = if initial_range > 0.0 {
            1.0 - final_range / initial_range
        } else {
            0.0
        };

        let mut confidence: f64 = match pattern_type {
            PatternType::SymmetricTriangle => 0.85,
            _ => 0.8,
        };
        if compression > self.min_compression.get() {
            confidence += 0.1;
        }

        let levels = boundary_levels(bars, ctx, pattern_type, direction, &upper, &lower, n)?;

        let description = format!(
            "{} over {} bars: compression {:.1}%, lines converge {:.0} bars from window start at {:.2}",
            pattern_type.title(),
            n,
            compression * 100.0,
            apex_x,
            apex_price
        );

        Some(
            PatternCandidate::new(
                pattern_type,
                direction,
                confidence.min(1.0),
                last_close,
                description,
            )
            .with_levels(Some(levels)),
        )
    }
}

/// Entry on the breakout boundary at the last bar, stop on the opposite one,
/// target one opening height beyond entry.
pub(crate) fn boundary_levels<T: OHLCV>(
    bars: &[T],
    ctx: &SeriesContext,
    pattern_type: PatternType,
    direction: Direction,
    upper: &LineFit,
    lower: &LineFit,
    len: usize,
) -> Option<crate::PriceLevels> {
    let last_x = (len - 1) as f64;
    let (top, bottom) = (upper.at(last_x), lower.at(last_x));
    let opening = upper.at(0.0) - lower.at(0.0);
    if opening <= 0.0 {
        return None;
    }

    let (entry, target, stop) = match direction {
        Direction::Bullish => (top, top + opening, bottom),
        Direction::Bearish => (bottom, bottom - opening, top),
    };
    Some(validated_levels(
        bars,
        ctx,
        pattern_type,
        direction,
        entry,
        target,
        stop,
    ))
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 30.0, (20.0, 60.0, 10.0), "Bars fitted by the trend lines"),
    ParamMeta::ratio(
        "flat_slope",
        1e-4,
        (5e-5, 5e-4, 5e-5),
        "Normalized slope treated as horizontal",
    ),
    ParamMeta::period(
        "apex_horizon",
        2.0,
        (1.0, 4.0, 1.0),
        "Apex horizon in multiples of the lookback",
    ),
    ParamMeta::ratio(
        "min_compression",
        0.2,
        (0.1, 0.5, 0.1),
        "Range compression earning the confidence bonus",
    ),
];

impl ParameterizedDetector for TriangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            lookback: get_period(params, "lookback", 30)?,
            flat_slope: get_ratio(params, "flat_slope", 1e-4)?,
            apex_horizon: get_period(params, "apex_horizon", 2)?,
            min_compression: get_ratio(params, "min_compression", 0.2)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "triangle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let eps = 1e-4;
        assert_eq!(classify(-1e-3, 1e-3, eps), Some(PatternType::SymmetricTriangle));
        assert_eq!(classify(-1e-3, 0.0, eps), Some(PatternType::DescendingTriangle));
        assert_eq!(classify(0.0, 1e-3, eps), Some(PatternType::AscendingTriangle));
        assert_eq!(classify(1e-3, 1e-3, eps), None);
        assert_eq!(classify(0.0, 0.0, eps), None);
    }
}
