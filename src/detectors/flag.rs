//! Flag detector (bull and bear)

use std::collections::HashMap;

use super::helpers::{closes, max_high, min_low, validated_levels};
use crate::{
    indicators::{linear_fit, mean, std_dev},
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Period, Ratio, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(FlagDetector);

/// A strong shift of mean close between two adjacent windows (the pole),
/// followed by a counter-sloped channel over the latest window (the flag).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FlagDetector {
    pub window: Period,
    /// Minimum relative change of mean close between the two windows
    pub min_shift: Ratio,
    /// Channel quality above this adds to confidence
    pub min_channel_quality: Ratio,
}

impl Default for FlagDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            min_shift: Ratio::new_const(0.05),
            min_channel_quality: Ratio::new_const(0.9),
        }
    }
}

impl PatternDetector for FlagDetector {
    fn id(&self) -> PatternId {
        PatternId("flag")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::TrendLine
    }

    fn min_bars(&self) -> usize {
        2 * self.window.get()
    }

    fn validate_config(&self) -> Result<()> {
        if self.window.get() < 2 {
            return Err(PatternError::InvalidConfig("window must be >= 2".into()));
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let w = self.window.get();
        let len = bars.len();
        if len < 2 * w {
            return None;
        }
        let pole = &bars[len - 2 * w..len - w];
        let flag = &bars[len - w..];
        let flag_closes = closes(flag);

        let start = mean(&closes(pole))?;
        let end = mean(&flag_closes)?;
        if start == 0.0 {
            return None;
        }
        let shift = (end - start) / start;
        if shift.abs() <= self.min_shift.get() {
            return None;
        }

        let fit = linear_fit(&flag_closes)?;
        let opposing = (shift > 0.0 && fit.slope < 0.0) || (shift < 0.0 && fit.slope > 0.0);
        if !opposing {
            return None;
        }

        let (pattern_type, direction) = if shift > 0.0 {
            (PatternType::BullFlag, Direction::Bullish)
        } else {
            (PatternType::BearFlag, Direction::Bearish)
        };

        let residuals: Vec<f64> = flag_closes
            .iter()
            .enumerate()
            .map(|(i, y)| y - fit.at(i as f64))
            .collect();
        let quality = 1.0 - std_dev(&residuals)? / end;
        let confidence = if quality > self.min_channel_quality.get() {
            0.8
        } else {
            0.7
        };

        let pole_height = max_high(pole)? - min_low(pole)?;
        let (flag_high, flag_low) = (max_high(flag)?, min_low(flag)?);
        let (entry, target, stop) = match direction {
            Direction::Bullish => (flag_high, flag_high + pole_height, flag_low),
            Direction::Bearish => (flag_low, flag_low - pole_height, flag_high),
        };
        let levels = validated_levels(bars, ctx, pattern_type, direction, entry, target, stop);

        let description = format!(
            "{} after a {:.1}% move: pole height {:.2}, channel {:.2}-{:.2}, channel quality {:.3}",
            pattern_type.title(),
            shift.abs() * 100.0,
            pole_height,
            flag_low,
            flag_high,
            quality
        );

        Some(
            PatternCandidate::new(
                pattern_type,
                direction,
                confidence,
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

static FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 20.0, (10.0, 40.0, 5.0), "Bars in the pole and in the flag"),
    ParamMeta::ratio(
        "min_shift",
        0.05,
        (0.03, 0.15, 0.01),
        "Minimum mean-close change between pole and flag",
    ),
    ParamMeta::ratio(
        "min_channel_quality",
        0.9,
        (0.8, 0.99, 0.01),
        "Channel quality earning the confidence bonus",
    ),
];

impl ParameterizedDetector for FlagDetector {
    fn param_meta() -> &'static [ParamMeta] {
        FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 20)?,
            min_shift: get_ratio(params, "min_shift", 0.05)?,
            min_channel_quality: get_ratio(params, "min_channel_quality", 0.9)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "flag"
    }
}
