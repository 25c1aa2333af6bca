//! Head & Shoulders detector (standard and inverse)

use std::collections::HashMap;

use super::helpers::{highs, min_low, validated_levels, within_tolerance, EXTREMA_MIN_BARS};
use crate::{
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    DetectorKind, Direction, PatternCandidate, PatternDetector, PatternError, PatternId,
    PatternType, Ratio, Result, SeriesContext, OHLCV,
};

impl_with_defaults!(HeadAndShouldersDetector);

/// Five consecutive maxima of highs: shoulder, peak, head, peak, shoulder.
///
/// The lower inner peak must sit below the lower shoulder.
/// The earliest qualifying window wins. A last close above the head makes it
/// an inverse (bullish) pattern; otherwise it is the standard bearish form.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeadAndShouldersDetector {
    /// Head must exceed both shoulders by this fraction
    pub min_head_excess: Ratio,
    /// Max relative difference between the shoulders
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            min_head_excess: Ratio::new_const(0.02),
            shoulder_tolerance: Ratio::new_const(0.03),
        }
    }
}

impl PatternDetector for HeadAndShouldersDetector {
    fn id(&self) -> PatternId {
        PatternId("head_and_shoulders")
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Extrema
    }

    fn min_bars(&self) -> usize {
        EXTREMA_MIN_BARS
    }

    fn validate_config(&self) -> Result<()> {
        if self.shoulder_tolerance.get() == 0.0 {
            return Err(PatternError::InvalidConfig(
                "shoulder_tolerance must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate> {
        let peaks = &ctx.high_extrema.maxima;
        if peaks.len() < 5 {
            return None;
        }
        let highs = highs(bars);

        for w in peaks.windows(5) {
            let [p1, p2, p3, p4, p5] = [w[0], w[1], w[2], w[3], w[4]].map(|i| highs[i]);

            let outer = p1.max(p5);
            if p3 <= outer || p3 < outer * (1.0 + self.min_head_excess.get()) {
                continue;
            }
            if !within_tolerance(p1, p5, self.shoulder_tolerance.get()) {
                continue;
            }
            if p2.min(p4) >= p1.min(p5) {
                continue;
            }

            tracing::debug!(
                "[{}] head {:.4} at {} between shoulders {:.4} at {} and {:.4} at {}",
                self.id().as_str(),
                p3,
                w[2],
                p1,
                w[0],
                p5,
                w[4]
            );
            return self.build(bars, ctx, w, [p1, p3, p5]);
        }

        None
    }
}

impl HeadAndShouldersDetector {
    fn build<T: OHLCV>(
        &self,
        bars: &[T],
        ctx: &SeriesContext,
        peaks: &[usize],
        [left, head, right]: [f64; 3],
    ) -> Option<PatternCandidate> {
        let (i1, i3, i5) = (peaks[0], peaks[2], peaks[4]);
        let left_trough = min_low(&bars[i1..=i3])?;
        let right_trough = min_low(&bars[i3..=i5])?;
        let neckline = (left_trough + right_trough) / 2.0;
        let height = head - neckline;
        if height <= 0.0 {
            return None;
        }

        let last_close = bars.last()?.close();
        let inverse = last_close > head;
        let direction = if inverse {
            Direction::Bullish
        } else {
            Direction::Bearish
        };

        let shoulder_volume = (bars[i1].volume() + bars[i5].volume()) / 2.0;
        let volume_confirms = bars[i3].volume() > shoulder_volume;
        let confidence = if volume_confirms { 0.8 } else { 0.6 };

        let angle = ((right - left) / (i5 - i1) as f64).atan().to_degrees();

        let (entry, target, stop) = if inverse {
            (head, head + height, neckline)
        } else {
            (neckline, neckline - height, head)
        };
        let levels = validated_levels(
            bars,
            ctx,
            PatternType::HeadAndShoulders,
            direction,
            entry,
            target,
            stop,
        );

        let description = format!(
            "{} head and shoulders: head {:.2} at bar {}, shoulders {:.2} / {:.2}, neckline {:.2} (angle {:.1}°), {}",
            if inverse { "Inverse" } else { "Standard" },
            head,
            i3,
            left,
            right,
            neckline,
            angle,
            if volume_confirms {
                "confirmed by head volume"
            } else {
                "volume unconfirmed"
            }
        );

        Some(
            PatternCandidate::new(
                PatternType::HeadAndShoulders,
                direction,
                confidence,
                last_close,
                description,
            )
            .with_levels(Some(levels)),
        )
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static HEAD_AND_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "min_head_excess",
        0.02,
        (0.01, 0.05, 0.01),
        "Minimum head height above the higher shoulder",
    ),
    ParamMeta::ratio(
        "shoulder_tolerance",
        0.03,
        (0.01, 0.06, 0.01),
        "Maximum relative difference between shoulders",
    ),
];

impl ParameterizedDetector for HeadAndShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_AND_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_head_excess: get_ratio(params, "min_head_excess", 0.02)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.03)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "head_and_shoulders"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::ExtremaSet;
    use crate::Bar;

    /// 60 flat bars around 95 with the given highs placed at bars 10, 20, .., 50
    fn setup(peaks: [f64; 5]) -> (Vec<Bar>, SeriesContext) {
        let mut bars: Vec<Bar> = (0..60)
            .map(|i| Bar::new(i, 95.0, 95.5, 94.5, 95.0, 1000.0))
            .collect();
        let idx = vec![10, 20, 30, 40, 50];
        for (&i, &h) in idx.iter().zip(&peaks) {
            bars[i].high = h;
        }
        let ctx = SeriesContext {
            window: 5,
            high_extrema: ExtremaSet {
                maxima: idx,
                minima: Vec::new(),
            },
            ..SeriesContext::default()
        };
        (bars, ctx)
    }

    #[test]
    fn test_one_inner_peak_above_a_shoulder() {
        let (bars, ctx) = setup([105.5, 106.5, 112.5, 100.5, 105.5]);
        let hs = HeadAndShouldersDetector::default()
            .detect(&bars, &ctx)
            .expect("lower inner peak sits below both shoulders");
        assert_eq!(hs.direction, Direction::Bearish);
        assert_eq!(hs.confidence, 0.6);
        let levels = hs.levels.unwrap();
        assert_eq!(levels.entry_price, 94.5);
        assert!(levels.stop_loss > levels.entry_price);
        assert!(levels.take_profit < levels.entry_price);
    }

    #[test]
    fn test_both_inner_peaks_above_lower_shoulder() {
        let (bars, ctx) = setup([105.5, 106.5, 112.5, 106.0, 105.5]);
        assert!(HeadAndShouldersDetector::default().detect(&bars, &ctx).is_none());
    }

    #[test]
    fn test_head_volume_confirms() {
        let (mut bars, ctx) = setup([105.5, 100.5, 112.5, 100.5, 105.5]);
        bars[30].volume = 3000.0;
        let hs = HeadAndShouldersDetector::default().detect(&bars, &ctx).unwrap();
        assert_eq!(hs.confidence, 0.8);
        assert!(hs.description.contains("confirmed by head volume"));
    }

    #[test]
    fn test_head_too_low() {
        // 107.0 < 105.5 * 1.02
        let (bars, ctx) = setup([105.5, 100.5, 107.0, 100.5, 105.5]);
        assert!(HeadAndShouldersDetector::default().detect(&bars, &ctx).is_none());
    }
}
