//! Confidence scoring: trend, volume and indicator confirmation stages

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;
use crate::trend::TrendLabel;
use crate::{PatternCandidate, PatternType, SeriesContext};

/// Step sizes and thresholds of the scoring stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub trend_bonus: f64,
    pub volume_step: f64,
    pub high_volume_ratio: f64,
    pub low_volume_ratio: f64,
    pub extreme_bonus: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub lower_band_position: f64,
    pub upper_band_position: f64,
    pub macd_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trend_bonus: 0.10,
            volume_step: 0.05,
            high_volume_ratio: 1.2,
            low_volume_ratio: 0.8,
            extreme_bonus: 0.10,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            lower_band_position: 0.2,
            upper_band_position: 0.8,
            macd_bonus: 0.05,
        }
    }
}

/// Adjusts detector confidence in three fixed stages, clamping to [0, 1]
/// after each one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceScorer {
    pub config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Run all stages against the series context.
    pub fn score(&self, candidate: &mut PatternCandidate, ctx: &SeriesContext) {
        let base = candidate.confidence;
        let c = self.trend_alignment(base, candidate.pattern_type, ctx.trend);
        let c = self.volume_confirmation(c, ctx.indicators.volume_ratio);
        let c = self.indicator_confirmation(c, candidate.pattern_type, &ctx.indicators);
        tracing::trace!(
            "{} confidence {:.3} -> {:.3}",
            candidate.pattern_type,
            base,
            c
        );
        candidate.confidence = c;
    }

    /// Bonus when the series trend agrees with the pattern's bias.
    pub fn trend_alignment(
        &self,
        confidence: f64,
        pattern_type: PatternType,
        trend: Option<TrendLabel>,
    ) -> f64 {
        let aligned = trend.is_some() && pattern_type.aligned_trend() == trend;
        if aligned {
            tracing::trace!("{} aligned with {:?} trend", pattern_type, trend);
            clamp(confidence + self.config.trend_bonus)
        } else {
            clamp(confidence)
        }
    }

    /// Reward above-average recent volume, penalize dry volume.
    pub fn volume_confirmation(&self, confidence: f64, volume_ratio: Option<f64>) -> f64 {
        let cfg = &self.config;
        match volume_ratio {
            Some(r) if r > cfg.high_volume_ratio => clamp(confidence + cfg.volume_step),
            Some(r) if r < cfg.low_volume_ratio => clamp(confidence - cfg.volume_step),
            _ => clamp(confidence),
        }
    }

    /// RSI and Bollinger extremes for tops/bottoms, plus any MACD crossover.
    pub fn indicator_confirmation(
        &self,
        confidence: f64,
        pattern_type: PatternType,
        snapshot: &IndicatorSnapshot,
    ) -> f64 {
        let cfg = &self.config;
        let mut c = confidence;

        if let (Some(rsi), Some(pos)) = (snapshot.rsi, snapshot.bollinger_position) {
            let oversold = rsi < cfg.rsi_oversold && pos < cfg.lower_band_position;
            let overbought = rsi > cfg.rsi_overbought && pos > cfg.upper_band_position;
            if (pattern_type.is_bottom_family() && oversold)
                || (pattern_type.is_top_family() && overbought)
            {
                tracing::trace!("{} at extreme: rsi {:.1}, band {:.2}", pattern_type, rsi, pos);
                c += cfg.extreme_bonus;
            }
        }

        if snapshot.macd_crossover {
            c += cfg.macd_bonus;
        }

        clamp(c)
    }
}

#[inline]
fn clamp(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_trend_alignment() {
        let s = ConfidenceScorer::default();
        let bull = Some(TrendLabel::Bullish);
        let bear = Some(TrendLabel::Bearish);

        assert!(approx(s.trend_alignment(0.7, PatternType::DoubleBottom, bull), 0.8));
        assert!(approx(s.trend_alignment(0.7, PatternType::FallingWedge, bull), 0.8));
        assert!(approx(s.trend_alignment(0.7, PatternType::DoubleTop, bull), 0.7));
        assert!(approx(s.trend_alignment(0.7, PatternType::DescendingTriangle, bear), 0.8));
        assert!(approx(s.trend_alignment(0.7, PatternType::HeadAndShoulders, bear), 0.7));
        assert!(approx(s.trend_alignment(0.7, PatternType::BullFlag, bull), 0.7));
        assert!(approx(s.trend_alignment(0.7, PatternType::DoubleBottom, None), 0.7));
        assert_eq!(s.trend_alignment(0.95, PatternType::TripleTop, bear), 1.0);
    }

    #[test]
    fn test_volume_confirmation() {
        let s = ConfidenceScorer::default();
        assert!(approx(s.volume_confirmation(0.5, Some(1.5)), 0.55));
        assert!(approx(s.volume_confirmation(0.5, Some(0.5)), 0.45));
        assert!(approx(s.volume_confirmation(0.5, Some(1.0)), 0.5));
        assert!(approx(s.volume_confirmation(0.5, None), 0.5));
        assert_eq!(s.volume_confirmation(0.02, Some(0.1)), 0.0);
    }

    #[test]
    fn test_indicator_extremes_only_for_tops_and_bottoms() {
        let s = ConfidenceScorer::default();
        let oversold = IndicatorSnapshot {
            rsi: Some(25.0),
            bollinger_position: Some(0.1),
            macd_crossover: false,
            volume_ratio: None,
        };
        assert!(approx(s.indicator_confirmation(0.7, PatternType::DoubleBottom, &oversold), 0.8));
        assert!(approx(s.indicator_confirmation(0.7, PatternType::TripleBottom, &oversold), 0.8));
        assert!(approx(s.indicator_confirmation(0.7, PatternType::DoubleTop, &oversold), 0.7));
        assert!(approx(s.indicator_confirmation(0.7, PatternType::FallingWedge, &oversold), 0.7));

        let overbought = IndicatorSnapshot {
            rsi: Some(80.0),
            bollinger_position: Some(0.95),
            macd_crossover: true,
            volume_ratio: None,
        };
        assert!(approx(s.indicator_confirmation(0.7, PatternType::TripleTop, &overbought), 0.85));
        assert!(approx(s.indicator_confirmation(0.7, PatternType::BearFlag, &overbought), 0.75));
    }

    #[test]
    fn test_undefined_indicators_neutral() {
        let s = ConfidenceScorer::default();
        let snap = IndicatorSnapshot::default();
        assert!(approx(s.indicator_confirmation(0.6, PatternType::DoubleBottom, &snap), 0.6));
    }

    #[test]
    fn test_score_clamps_to_unit_interval() {
        let s = ConfidenceScorer::default();
        let ctx = SeriesContext {
            trend: Some(TrendLabel::Bearish),
            indicators: IndicatorSnapshot {
                rsi: Some(90.0),
                bollinger_position: Some(1.0),
                macd_crossover: true,
                volume_ratio: Some(3.0),
            },
            ..SeriesContext::default()
        };
        let mut c = PatternCandidate::new(
            PatternType::DoubleTop,
            Direction::Bearish,
            1.0,
            100.0,
            String::new(),
        );
        s.score(&mut c, &ctx);
        assert_eq!(c.confidence, 1.0);
    }
}
