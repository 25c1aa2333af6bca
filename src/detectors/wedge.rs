//! Wedge detector (rising and falling)

use std::collections::HashMap;

use super::helpers::{highs, lows};
use super::triangle::boundary_levels;
use crate::{
    indicators::linear_fit,
    params::{get_period, get_scalar, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Period, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(WedgeDetector);

/// High and low lines sloping the same way over the last `lookback` bars,
/// with the high line no steeper than the low line.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WedgeDetector {
    pub lookback: Period,
    /// Angle between the lines (degrees) below which the wedge counts as tight
    pub tight_angle: f64,
}

impl Default for WedgeDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(30),
            tight_angle: 10.0,
        }
    }
}

impl PatternDetector for WedgeDetector {
    fn id(&self) -> PatternId {
        PatternId("wedge")
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
        if !(self.tight_angle > 0.0 && self.tight_angle <= 90.0) {
            return Err(PatternError::OutOfRange {
                field: "tight_angle",
                value: self.tight_angle,
                min: 0.0,
                max: 90.0,
            });
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let n = self.lookback.get();
        if bars.len() < n {
            return None;
        }
        let window = &bars[bars.len() - n..];
        let upper = linear_fit(&highs(window))?;
        let lower = linear_fit(&lows(window))?;
        let (hs, ls) = (upper.slope, lower.slope);

        let rising = hs > 0.0 && ls > 0.0;
        let falling = hs < 0.0 && ls < 0.0;
        if !(rising || falling) || hs > ls {
            return None;
        }

        let (pattern_type, direction) = if rising {
            (PatternType::RisingWedge, Direction::Bearish)
        } else {
            (PatternType::FallingWedge, Direction::Bullish)
        };

        let angle = (hs.atan().to_degrees() - ls.atan().to_degrees()).abs();
        let tight = angle < self.tight_angle;
        let confidence = if tight { 0.85 } else { 0.75 };

        let levels = boundary_levels(bars, ctx, pattern_type, direction, &upper, &lower, n)?;

        let description = format!(
            "{} over {} bars: line angle {:.1}°, slopes {:.4} / {:.4} per bar",
            pattern_type.title(),
            n,
            angle,
            hs,
            ls
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

static WEDGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 30.0, (20.0, 60.0, 10.0), "Bars fitted by the trend lines"),
    ParamMeta::scalar(
        "tight_angle",
        10.0,
        (5.0, 20.0, 5.0),
        "Line angle in degrees earning the confidence bonus",
    ),
];

impl ParameterizedDetector for WedgeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            lookback: get_period(params, "lookback", 30)?,
            tight_angle: get_scalar(params, "tight_angle", 10.0)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "wedge"
    }
}
