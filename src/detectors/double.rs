//! Double Top and Double Bottom detectors

use std::collections::HashMap;

use super::helpers::{
    highs, lows, max_high, min_low, momentum, validated_levels, within_tolerance,
    EXTREMA_MIN_BARS, MOMENTUM_LOOKBACK,
};
use crate::{
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Ratio, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(DoubleTopDetector, DoubleBottomDetector);

fn check_config(tolerance: Ratio) -> Result<()> {
    if tolerance.get() == 0.0 {
        return Err(PatternError::InvalidConfig("tolerance must be > 0".into()));
    }
    Ok(())
}

// ============================================================
// DOUBLE TOP
// ============================================================

/// Last two maxima of highs at a similar level with a deep trough between them
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DoubleTopDetector {
    /// Max relative difference between the peaks
    pub tolerance: Ratio,
    /// Trough must sit this fraction below the lower peak
    pub min_trough_depth: Ratio,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.02),
            min_trough_depth: Ratio::new_const(0.03),
        }
    }
}

impl PatternDetector for DoubleTopDetector {
    fn id(&self) -> PatternId {
        PatternId("double_top")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Extrema
    }

    fn min_bars(&self) -> usize {
        EXTREMA_MIN_BARS
    }

    fn validate_config(&self) -> Result<()> {
        check_config(self.tolerance)
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let &[i1, i2] = ctx.high_extrema.last_maxima(2)? else {
            return None;
        };
        let highs = highs(bars);
        let (p1, p2) = (highs[i1], highs[i2]);

        if !within_tolerance(p1, p2, self.tolerance.get()) {
            return None;
        }
        let distance = i2 - i1;
        if distance < 2 * ctx.window {
            tracing::debug!(
                "[{}] peaks at {} and {} only {} bars apart",
                self.id().as_str(),
                i1,
                i2,
                distance
            );
            return None;
        }
        let trough = min_low(&bars[i1..i2])?;
        if trough >= p1.min(p2) * (1.0 - self.min_trough_depth.get()) {
            return None;
        }

        let volume_fading = bars[i2].volume() < bars[i1].volume();
        let weakening = momentum(&highs, i2, MOMENTUM_LOOKBACK)
            .zip(momentum(&highs, i1, MOMENTUM_LOOKBACK))
            .is_some_and(|(m2, m1)| m2 < m1);

        let mut confidence: f64 = 0.8;
        if volume_fading {
            confidence += 0.1;
        }
        if weakening {
            confidence += 0.1;
        }

        let top = p1.max(p2);
        let height = top - trough;
        let levels = validated_levels(
            bars,
            ctx,
            PatternType::DoubleTop,
            Direction::Bearish,
            trough,
            trough - height,
            top,
        );

        let mut description = format!(
            "Double top at {:.2} / {:.2}, {} bars apart, trough {:.2}",
            p1, p2, distance, trough
        );
        if weakening {
            description.push_str(", momentum weakening into the second peak");
        }
        if volume_fading {
            description.push_str(", volume declining");
        }

        Some(
            PatternCandidate::new(
                PatternType::DoubleTop,
                Direction::Bearish,
                confidence.min(1.0),
                bars.last()?.close(),
                description,
            )
            .with_levels(Some(levels)),
        )
    }
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

/// Last two minima of lows at a similar level with a clear peak between them
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DoubleBottomDetector {
    /// Max relative difference between the troughs
    pub tolerance: Ratio,
    /// Intervening peak must sit this fraction above the higher trough
    pub min_peak_height: Ratio,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.02),
            min_peak_height: Ratio::new_const(0.03),
        }
    }
}

impl PatternDetector for DoubleBottomDetector {
    fn id(&self) -> PatternId {
        PatternId("double_bottom")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Extrema
    }

    fn min_bars(&self) -> usize {
        EXTREMA_MIN_BARS
    }

    fn validate_config(&self) -> Result<()> {
        check_config(self.tolerance)
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let &[i1, i2] = ctx.low_extrema.last_minima(2)? else {
            return None;
        };
        let lows = lows(bars);
        let (t1, t2) = (lows[i1], lows[i2]);

        if !within_tolerance(t1, t2, self.tolerance.get()) {
            return None;
        }
        let distance = i2 - i1;
        if distance < 2 * ctx.window {
            tracing::debug!(
                "[{}] troughs at {} and {} only {} bars apart",
                self.id().as_str(),
                i1,
                i2,
                distance
            );
            return None;
        }
        let peak = max_high(&bars[i1..i2])?;
        if peak <= t1.max(t2) * (1.0 + self.min_peak_height.get()) {
            return None;
        }

        let volume_rising = bars[i2].volume() > bars[i1].volume();
        let strengthening = momentum(&lows, i2, MOMENTUM_LOOKBACK)
            .zip(momentum(&lows, i1, MOMENTUM_LOOKBACK))
            .is_some_and(|(m2, m1)| m2 > m1);

        let mut confidence: f64 = 0.8;
        if volume_rising {
            confidence += 0.1;
        }
        if strengthening {
            confidence += 0.1;
        }

        let bottom = t1.min(t2);
        let height = peak - bottom;
        let levels = validated_levels(
            bars,
            ctx,
            PatternType::DoubleBottom,
            Direction::Bullish,
            peak,
            peak + height,
            bottom,
        );

        let mut description = format!(
            "Double bottom at {:.2} / {:.2}, {} bars apart, peak {:.2}",
            t1, t2, distance, peak
        );
        if strengthening {
            description.push_str(", momentum strengthening into the second trough");
        }
        if volume_rising {
            description.push_str(", volume rising");
        }

        Some(
            PatternCandidate::new(
                PatternType::DoubleBottom,
                Direction::Bullish,
                confidence.min(1.0),
                bars.last()?.close(),
                description,
            )
            .with_levels(Some(levels)),
        )
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOUBLE_TOP_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "tolerance",
        0.02,
        (0.01, 0.05, 0.01),
        "Maximum relative difference between peaks",
    ),
    ParamMeta::ratio(
        "min_trough_depth",
        0.03,
        (0.02, 0.08, 0.01),
        "Minimum trough depth below the lower peak",
    ),
];

static DOUBLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "tolerance",
        0.02,
        (0.01, 0.05, 0.01),
        "Maximum relative difference between troughs",
    ),
    ParamMeta::ratio(
        "min_peak_height",
        0.03,
        (0.02, 0.08, 0.01),
        "Minimum peak height above the higher trough",
    ),
];

impl ParameterizedDetector for DoubleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_TOP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.02)?,
            min_trough_depth: get_ratio(params, "min_trough_depth", 0.03)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "double_top"
    }
}

impl ParameterizedDetector for DoubleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.02)?,
            min_peak_height: get_ratio(params, "min_peak_height", 0.03)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "double_bottom"
    }
}
