//! # chartpat - chart pattern analysis engine
//!
//! Detects geometric chart patterns (head & shoulders, double/triple tops and
//! bottoms, triangles, wedges, flags) in a finite OHLCV series, scores them,
//! derives entry / stop-loss / take-profit levels and tracks retests of the
//! pattern's key level.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartpat::prelude::*;
//!
//! // Define your OHLCV data
//! struct Candle { o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl OHLCV for Candle {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! // Create engine with every chart pattern detector
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! // Analyze your data; short or malformed input yields no candidates
//! let candles: Vec<Candle> = vec![];
//! let patterns = engine.analyze(&candles);
//! assert!(patterns.is_empty());
//! ```

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

pub mod detectors;
pub mod extrema;
pub mod indicators;
pub mod levels;
pub mod params;
pub mod retest;
pub mod scoring;
pub mod trend;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Building blocks
        extrema::{find_extrema, ExtremaSet},
        indicators::{IndicatorParams, IndicatorSnapshot},
        levels::{risk_reward_ratio, PriceLevelValidator},
        // Parameters
        params::{get_period, get_ratio, get_scalar, ParamMeta, ParamType, ParameterizedDetector},
        retest::{RetestTracker, ZoneFamily},
        scoring::{ConfidenceScorer, ScoringConfig},
        trend::{classify_trend, TrendClassifier, TrendLabel},
        // Parallel
        scan_parallel,
        // Types
        Bar,
        // Engine
        BuiltinDetector,
        ContextProvider,
        DefaultContextProvider,
        DetectorKind,
        Direction,
        // Core traits
        DynPatternDetector,
        EngineBuilder,
        EngineConfig,
        OHLCVExt,
        PatternCandidate,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternId,
        PatternType,
        Period,
        PriceLevels,
        Ratio,
        Result,
        RetestStatus,
        ScanError,
        ScanResult,
        SeriesContext,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors reported by configuration and input validation.
///
/// Detection itself never fails: detectors abstain instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Timestamp at index {index} does not increase")]
    NonMonotonicTimestamp { index: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Blanket impl for references to dyn OHLCV
impl OHLCV for &dyn OHLCV {
    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (*self).timestamp()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [
            self.open(),
            self.high(),
            self.low(),
            self.close(),
            self.volume(),
        ];
        if values.iter().any(|v| v.is_nan()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume() < 0.0 {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Plain OHLCV bar (timestamp in epoch milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

// ============================================================
// PATTERN CANDIDATE - result of detection
// ============================================================

/// Identifier of a detector family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Concrete chart pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    HeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    SymmetricTriangle,
    AscendingTriangle,
    DescendingTriangle,
    RisingWedge,
    FallingWedge,
    BullFlag,
    BearFlag,
}

impl PatternType {
    pub const ALL: [PatternType; 12] = [
        PatternType::HeadAndShoulders,
        PatternType::DoubleTop,
        PatternType::DoubleBottom,
        PatternType::TripleTop,
        PatternType::TripleBottom,
        PatternType::SymmetricTriangle,
        PatternType::AscendingTriangle,
        PatternType::DescendingTriangle,
        PatternType::RisingWedge,
        PatternType::FallingWedge,
        PatternType::BullFlag,
        PatternType::BearFlag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::HeadAndShoulders => "head_and_shoulders",
            PatternType::DoubleTop => "double_top",
            PatternType::DoubleBottom => "double_bottom",
            PatternType::TripleTop => "triple_top",
            PatternType::TripleBottom => "triple_bottom",
            PatternType::SymmetricTriangle => "symmetric_triangle",
            PatternType::AscendingTriangle => "ascending_triangle",
            PatternType::DescendingTriangle => "descending_triangle",
            PatternType::RisingWedge => "rising_wedge",
            PatternType::FallingWedge => "falling_wedge",
            PatternType::BullFlag => "bull_flag",
            PatternType::BearFlag => "bear_flag",
        }
    }

    /// Human-readable name, e.g. "Ascending Triangle"
    pub fn title(&self) -> &'static str {
        match self {
            PatternType::HeadAndShoulders => "Head and Shoulders",
            PatternType::DoubleTop => "Double Top",
            PatternType::DoubleBottom => "Double Bottom",
            PatternType::TripleTop => "Triple Top",
            PatternType::TripleBottom => "Triple Bottom",
            PatternType::SymmetricTriangle => "Symmetric Triangle",
            PatternType::AscendingTriangle => "Ascending Triangle",
            PatternType::DescendingTriangle => "Descending Triangle",
            PatternType::RisingWedge => "Rising Wedge",
            PatternType::FallingWedge => "Falling Wedge",
            PatternType::BullFlag => "Bull Flag",
            PatternType::BearFlag => "Bear Flag",
        }
    }

    #[inline]
    pub fn is_top_family(&self) -> bool {
        matches!(self, PatternType::DoubleTop | PatternType::TripleTop)
    }

    #[inline]
    pub fn is_bottom_family(&self) -> bool {
        matches!(self, PatternType::DoubleBottom | PatternType::TripleBottom)
    }

    /// Trend this pattern type is aligned with for confidence scoring.
    ///
    /// `None` for head & shoulders, symmetric triangles and flags.
    pub fn aligned_trend(&self) -> Option<TrendLabel> {
        match self {
            PatternType::DoubleBottom
            | PatternType::TripleBottom
            | PatternType::AscendingTriangle
            | PatternType::FallingWedge => Some(TrendLabel::Bullish),
            PatternType::DoubleTop
            | PatternType::TripleTop
            | PatternType::DescendingTriangle
            | PatternType::RisingWedge => Some(TrendLabel::Bearish),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implied trade direction of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// +1.0 for bullish, -1.0 for bearish
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
        }
    }
}

/// Post-detection retest state of a candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetestStatus {
    #[default]
    None,
    Pending,
    Confirmed,
    Failed,
}

/// Trade levels attached to a candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// `|take_profit - entry| / |stop_loss - entry|` rounded to 2 decimals, 0 without risk
    pub risk_reward_ratio: f64,
}

impl PriceLevels {
    pub fn new(entry_price: f64, take_profit: f64, stop_loss: f64) -> Self {
        Self {
            entry_price,
            take_profit,
            stop_loss,
            risk_reward_ratio: levels::risk_reward_ratio(entry_price, take_profit, stop_loss),
        }
    }

    fn is_finite(&self) -> bool {
        self.entry_price.is_finite()
            && self.take_profit.is_finite()
            && self.stop_loss.is_finite()
            && self.risk_reward_ratio.is_finite()
    }
}

/// A detected chart pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    pub pattern_type: PatternType,
    pub direction: Direction,
    /// Confidence score 0.0..=1.0
    pub confidence: f64,
    /// Last close of the analyzed series
    pub anchor_price: f64,
    pub levels: Option<PriceLevels>,
    pub description: String,
    pub retest_status: RetestStatus,
    pub retest_price: Option<f64>,
    pub retest_description: Option<String>,
}

impl PatternCandidate {
    pub fn new(
        pattern_type: PatternType,
        direction: Direction,
        confidence: f64,
        anchor_price: f64,
        description: String,
    ) -> Self {
        Self {
            pattern_type,
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            anchor_price,
            levels: None,
            description,
            retest_status: RetestStatus::None,
            retest_price: None,
            retest_description: None,
        }
    }

    pub fn with_levels(mut self, levels: Option<PriceLevels>) -> Self {
        self.levels = levels;
        self
    }

    #[inline]
    pub fn entry_price(&self) -> Option<f64> {
        self.levels.map(|l| l.entry_price)
    }

    #[inline]
    pub fn take_profit(&self) -> Option<f64> {
        self.levels.map(|l| l.take_profit)
    }

    #[inline]
    pub fn stop_loss(&self) -> Option<f64> {
        self.levels.map(|l| l.stop_loss)
    }

    #[inline]
    pub fn risk_reward_ratio(&self) -> Option<f64> {
        self.levels.map(|l| l.risk_reward_ratio)
    }

    fn is_finite(&self) -> bool {
        self.confidence.is_finite()
            && self.anchor_price.is_finite()
            && self.levels.map_or(true, |l| l.is_finite())
    }
}

// ============================================================
// SERIES CONTEXT
// ============================================================

use extrema::{find_extrema, ExtremaSet};
use indicators::{IndicatorParams, IndicatorSnapshot};
use levels::PriceLevelValidator;
use trend::{TrendClassifier, TrendLabel};

/// Everything computed once per series and shared by all detectors
#[derive(Debug, Clone, Default)]
pub struct SeriesContext {
    /// Half-window used for extrema
    pub window: usize,
    /// Extrema of the high column (detectors read `maxima`)
    pub high_extrema: ExtremaSet,
    /// Extrema of the low column (detectors read `minima`)
    pub low_extrema: ExtremaSet,
    /// `None` when the series is too short for the classifier
    pub trend: Option<TrendLabel>,
    pub indicators: IndicatorSnapshot,
    pub validator: PriceLevelValidator,
    pub last_close: f64,
}

/// Provider of series context
pub trait ContextProvider: Send + Sync {
    fn compute<T: OHLCV>(&self, bars: &[T]) -> SeriesContext;
}

/// Default context provider: 20-bar extrema, 20/50 trend, standard indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultContextProvider {
    pub extrema_window: Period,
    pub trend: TrendClassifier,
    pub indicators: IndicatorParams,
    pub validator: PriceLevelValidator,
}

impl Default for DefaultContextProvider {
    fn default() -> Self {
        Self {
            extrema_window: Period::new_const(extrema::DEFAULT_EXTREMA_WINDOW),
            trend: TrendClassifier::default(),
            indicators: IndicatorParams::default(),
            validator: PriceLevelValidator::default(),
        }
    }
}

impl ContextProvider for DefaultContextProvider {
    fn compute<T: OHLCV>(&self, bars: &[T]) -> SeriesContext {
        let window = self.extrema_window.get();
        let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();

        SeriesContext {
            window,
            high_extrema: find_extrema(&highs, window),
            low_extrema: find_extrema(&lows, window),
            trend: self.trend.classify(bars).ok(),
            indicators: IndicatorSnapshot::compute(bars, &self.indicators),
            validator: self.validator.clone(),
            last_close: bars.last().map_or(0.0, |b| b.close()),
        }
    }
}

// ============================================================
// PATTERN DETECTOR TRAITS
// ============================================================

/// How a detector finds its geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Works on local extrema of highs/lows
    Extrema,
    /// Works on least-squares fits of recent bars
    TrendLine,
}

/// Additional metadata about a detector
#[derive(Debug, Clone)]
pub struct PatternMetadata {
    pub name: &'static str,
    pub kind: DetectorKind,
}

/// Generic pattern detector trait - for concrete types
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn kind(&self) -> DetectorKind;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &SeriesContext) -> Option<PatternCandidate>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        PatternMetadata {
            name: self.id().0,
            kind: self.kind(),
        }
    }
}

/// Object-safe pattern detector trait - for custom detectors
pub trait DynPatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn min_bars(&self) -> usize;
    fn detect(&self, bars: &[&dyn OHLCV], ctx: &SeriesContext) -> Option<PatternCandidate>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn id(&self) -> PatternId {
        PatternDetector::id(self)
    }

    fn min_bars(&self) -> usize {
        PatternDetector::min_bars(self)
    }

    fn detect(&self, bars: &[&dyn OHLCV], ctx: &SeriesContext) -> Option<PatternCandidate> {
        PatternDetector::detect(self, bars, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        PatternDetector::validate_config(self)
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                ctx: &SeriesContext,
            ) -> Option<PatternCandidate> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, ctx)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> DetectorKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

// Evaluation order of `with_all_defaults`
define_builtin_detectors! {
    HeadAndShoulders(HeadAndShouldersDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    TripleTop(TripleTopDetector),
    TripleBottom(TripleBottomDetector),
    Triangle(TriangleDetector),
    Wedge(WedgeDetector),
    Flag(FlagDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_confidence: Option<f64>,
    /// Reject NaN/inf values, high < low and non-increasing timestamps
    pub validate_data: bool,
    pub pattern_filter: Option<Vec<PatternType>>,
    /// Series shorter than this produce no candidates
    pub min_bars: usize,
    /// Run the retest tracker on each emitted candidate
    pub check_retest: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: None,
            validate_data: true,
            pattern_filter: None,
            min_bars: 50,
            check_retest: true,
        }
    }
}

/// Main chart pattern engine
pub struct PatternEngine<C: ContextProvider = DefaultContextProvider> {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    context_provider: C,
    scorer: scoring::ConfidenceScorer,
    retest: retest::RetestTracker,
    config: EngineConfig,
}

impl<C: ContextProvider> PatternEngine<C> {
    pub fn new(context_provider: C) -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            context_provider,
            scorer: scoring::ConfidenceScorer::default(),
            retest: retest::RetestTracker::default(),
            config: EngineConfig::default(),
        }
    }

    /// Compute the shared series context.
    #[inline]
    pub fn compute_context<T: OHLCV>(&self, bars: &[T]) -> SeriesContext {
        self.context_provider.compute(bars)
    }

    /// Analyze a series. Insufficient or malformed input yields an empty list.
    pub fn analyze<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternCandidate> {
        self.try_analyze(bars).unwrap_or_else(|e| {
            tracing::debug!("Analysis skipped: {}", e);
            Vec::new()
        })
    }

    /// Analyze a series, reporting why input was rejected.
    ///
    /// Candidates come back in detector order: builtins as registered, then
    /// custom detectors.
    pub fn try_analyze<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternCandidate>> {
        if bars.len() < self.config.min_bars {
            return Err(PatternError::InsufficientData {
                need: self.config.min_bars,
                got: bars.len(),
            });
        }
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }

        let ctx = self.compute_context(bars);
        Ok(self.analyze_with_context(bars, &ctx))
    }

    /// Run detectors, scoring and retest against a precomputed context.
    pub fn analyze_with_context<T: OHLCV>(
        &self,
        bars: &[T],
        ctx: &SeriesContext,
    ) -> Vec<PatternCandidate> {
        let mut results = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if bars.len() < detector.min_bars() {
                continue;
            }
            let found = run_isolated(detector.id(), || detector.detect(bars, ctx));
            if let Some(candidate) = found.and_then(|c| self.finalize(c, bars, ctx)) {
                results.push(candidate);
            }
        }

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            for detector in &self.custom {
                if bars.len() < detector.min_bars() {
                    continue;
                }
                let found = run_isolated(detector.id(), || detector.detect(&bar_refs, ctx));
                if let Some(candidate) = found.and_then(|c| self.finalize(c, bars, ctx)) {
                    results.push(candidate);
                }
            }
        }

        results
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn finalize<T: OHLCV>(
        &self,
        mut candidate: PatternCandidate,
        bars: &[T],
        ctx: &SeriesContext,
    ) -> Option<PatternCandidate> {
        self.scorer.score(&mut candidate, ctx);
        if !self.should_include(&candidate) {
            return None;
        }
        if self.config.check_retest {
            self.retest.check(&mut candidate, bars);
        }
        tracing::debug!(
            "{} detected ({:?}), confidence {:.2}, retest {:?}",
            candidate.pattern_type,
            candidate.direction,
            candidate.confidence,
            candidate.retest_status
        );
        Some(candidate)
    }

    fn should_include(&self, c: &PatternCandidate) -> bool {
        if let Some(min) = self.config.min_confidence {
            if c.confidence < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.pattern_filter {
            if !filter.contains(&c.pattern_type) {
                return false;
            }
        }
        true
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        let mut prev_ts: Option<i64> = None;
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;

            if let Some(ts) = bar.timestamp() {
                if prev_ts.is_some_and(|p| ts <= p) {
                    return Err(PatternError::NonMonotonicTimestamp { index: i });
                }
                prev_ts = Some(ts);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        if self.config.min_bars == 0 {
            return Err(PatternError::InvalidConfig("min_bars must be > 0".into()));
        }
        Ok(())
    }
}

/// Run one detector so that a panic or a non-finite result only drops its candidate.
fn run_isolated<F>(id: PatternId, detect: F) -> Option<PatternCandidate>
where
    F: FnOnce() -> Option<PatternCandidate>,
{
    match panic::catch_unwind(AssertUnwindSafe(detect)) {
        Ok(Some(candidate)) if candidate.is_finite() => Some(candidate),
        Ok(Some(candidate)) => {
            tracing::warn!(
                "[{}] discarded {} candidate with non-finite values",
                id.as_str(),
                candidate.pattern_type
            );
            None
        }
        Ok(None) => None,
        Err(_) => {
            tracing::error!("[{}] detector panicked, skipping", id.as_str());
            None
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder<C: ContextProvider = DefaultContextProvider> {
    context_provider: C,
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    scorer: scoring::ConfidenceScorer,
    retest: retest::RetestTracker,
    config: EngineConfig,
}

impl Default for EngineBuilder<DefaultContextProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<DefaultContextProvider> {
    pub fn new() -> Self {
        Self {
            context_provider: DefaultContextProvider::default(),
            builtin: Vec::new(),
            custom: Vec::new(),
            scorer: scoring::ConfidenceScorer::default(),
            retest: retest::RetestTracker::default(),
            config: EngineConfig::default(),
        }
    }
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl<C: ContextProvider> EngineBuilder<C> {
    /// Change context provider
    pub fn context_provider<C2: ContextProvider>(self, provider: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            context_provider: provider,
            builtin: self.builtin,
            custom: self.custom,
            scorer: self.scorer,
            retest: self.retest,
            config: self.config,
        }
    }

    /// Add all eight detector families in evaluation order
    pub fn with_all_defaults(self) -> Self {
        self.with_extrema_defaults().with_trend_line_defaults()
    }

    /// Add extrema-based detectors: head & shoulders, double and triple tops/bottoms
    pub fn with_extrema_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            HeadAndShoulders,
            DoubleTop,
            DoubleBottom,
            TripleTop,
            TripleBottom,
        ]);
        self
    }

    /// Add trend-line detectors: triangle, wedge, flag
    pub fn with_trend_line_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![Triangle, Wedge, Flag]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Replace the confidence scorer
    pub fn scorer(mut self, scorer: scoring::ConfidenceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the retest tracker
    pub fn retest_tracker(mut self, tracker: retest::RetestTracker) -> Self {
        self.retest = tracker;
        self
    }

    /// Replace the whole engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set minimum confidence filter
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Minimum series length accepted by `analyze`
    pub fn min_bars(mut self, bars: usize) -> Self {
        self.config.min_bars = bars;
        self
    }

    /// Enable/disable the retest check
    pub fn check_retest(mut self, enable: bool) -> Self {
        self.config.check_retest = enable;
        self
    }

    /// Filter to specific pattern types only
    pub fn only_patterns(mut self, types: impl IntoIterator<Item = PatternType>) -> Self {
        self.config.pattern_filter = Some(types.into_iter().collect());
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine<C>> {
        let engine = PatternEngine {
            builtin: self.builtin,
            custom: self.custom,
            context_provider: self.context_provider,
            scorer: self.scorer,
            retest: self.retest,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternCandidate>,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel analysis of multiple instruments
pub fn scan_parallel<'a, T, I, C>(
    engine: &PatternEngine<C>,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    C: ContextProvider + Sync,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .try_analyze(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Default engine with DefaultContextProvider
pub type DefaultEngine = PatternEngine<DefaultContextProvider>;

// ============================================================
// TESTS
// ============================================================
