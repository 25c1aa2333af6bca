//! Triple Top and Triple Bottom detectors

use std::collections::HashMap;

use super::helpers::{
    all_within_tolerance, highs, lows, max_high, min_low, strictly_decreasing,
    strictly_increasing, validated_levels, EXTREMA_MIN_BARS,
};
use crate::{
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Ratio, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(TripleTopDetector, TripleBottomDetector);

/// Last three maxima of highs pairwise within tolerance
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TripleTopDetector {
    pub tolerance: Ratio,
}

impl Default for TripleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for TripleTopDetector {
    fn id(&self) -> PatternId {
        PatternId("triple_top")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Extrema
    }

    fn min_bars(&self) -> usize {
        EXTREMA_MIN_BARS
    }

    fn validate_config(&self) -> Result<()> {
        if self.tolerance.get() == 0.0 {
            return Err(PatternError::InvalidConfig("tolerance must be > 0".into()));
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let idx = ctx.high_extrema.last_maxima(3)?;
        let highs = highs(bars);
        let peaks: Vec<f64> = idx.iter().map(|&i| highs[i]).collect();
        if !all_within_tolerance(&peaks, self.tolerance.get()) {
            return None;
        }

        let volumes: Vec<f64> = idx.iter().map(|&i| bars[i].volume()).collect();
        let volume_fading = strictly_decreasing(&volumes);
        let confidence = if volume_fading { 0.95 } else { 0.85 };

        let top = peaks.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let floor = min_low(&bars[idx[0]..=idx[2]])?;
        let height = top - floor;
        if height <= 0.0 {
            return None;
        }
        let levels = validated_levels(
            bars,
            ctx,
            PatternType::TripleTop,
            Direction::Bearish,
            floor,
            floor - height,
            top,
        );

        let description = format!(
            "Triple top at {:.2} / {:.2} / {:.2} over {} bars, support {:.2}{}",
            peaks[0],
            peaks[1],
            peaks[2],
            idx[2] - idx[0],
            floor,
            if volume_fading {
                ", volume declining across peaks"
            } else {
                ""
            }
        );

        Some(
            PatternCandidate::new(
                PatternType::TripleTop,
                Direction::Bearish,
                confidence,
                bars.last()?.close(),
                description,
            )
            .with_levels(Some(levels)),
        )
    }
}

/// Last three minima of lows pairwise within tolerance
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TripleBottomDetector {
    pub tolerance: Ratio,
}

impl Default for TripleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for TripleBottomDetector {
    fn id(&self) -> PatternId {
        PatternId("triple_bottom")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Extrema
    }

    fn min_bars(&self) -> usize {
        EXTREMA_MIN_BARS
    }

    fn validate_config(&self) -> Result<()> {
        if self.tolerance.get() == 0.0 {
            return Err(PatternError::InvalidConfig("tolerance must be > 0".into()));
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let idx = ctx.low_extrema.last_minima(3)?;
        let lows = lows(bars);
        let troughs: Vec<f64> = idx.iter().map(|&i| lows[i]).collect();
        if !all_within_tolerance(&troughs, self.tolerance.get()) {
            return None;
        }

        let volumes: Vec<f64> = idx.iter().map(|&i| bars[i].volume()).collect();
        let volume_rising = strictly_increasing(&volumes);
        let confidence = if volume_rising { 0.95 } else { 0.85 };

        let bottom = troughs.iter().copied().fold(f64::INFINITY, f64::min);
        let ceiling = max_high(&bars[idx[0]..=idx[2]])?;
        let height = ceiling - bottom;
        if height <= 0.0 {
            return None;
        }
        let levels = validated_levels(
            bars,
            ctx,
            PatternType::TripleBottom,
            Direction::Bullish,
            ceiling,
            ceiling + height,
            bottom,
        );

        let description = format!(
            "Triple bottom at {:.2} / {:.2} / {:.2} over {} bars, resistance {:.2}{}",
            troughs[0],
            troughs[1],
            troughs[2],
            idx[2] - idx[0],
            ceiling,
            if volume_rising {
                ", volume rising across troughs"
            } else {
                ""
            }
        );

        Some(
            PatternCandidate::new(
                PatternType::TripleBottom,
                Direction::Bullish,
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

static TRIPLE_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "tolerance",
    0.02,
    (0.01, 0.05, 0.01),
    "Maximum pairwise relative difference between the three extrema",
)];

impl ParameterizedDetector for TripleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIPLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.02)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "triple_top"
    }
}

impl ParameterizedDetector for TripleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIPLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.02)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "triple_bottom"
    }
}
