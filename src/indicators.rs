//! Technical indicators and line fitting
//!
//! Every function here is pure: it reads a slice and returns freshly allocated
//! values, so the caller's series is never touched. Positions where an indicator
//! is not defined yet (warmup) are `None`.

use serde::{Deserialize, Serialize};

use crate::OHLCV;

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Simple moving average. `out[i]` is the mean of `values[i + 1 - period..=i]`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = Some(window.iter().sum::<f64>() / period as f64);
    }
    out
}

/// Recursive exponential moving average with `alpha = 2 / (span + 1)`,
/// seeded with the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Rolling maximum over `period` values ending at each index.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Rolling minimum over `period` values ending at each index.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = Some(f(window));
    }
    out
}

// ============================================================
// MOMENTUM
// ============================================================

/// RSI using simple means of gains and losses over `period` price changes.
///
/// Defined from index `period` on. A window with neither gains nor losses
/// has no RSI; a window with gains only reads 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    for (i, window) in deltas.windows(period).enumerate() {
        let gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let loss = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;

        out[i + period] = if loss > 0.0 {
            Some(100.0 - 100.0 / (1.0 + gain / loss))
        } else if gain > 0.0 {
            Some(100.0)
        } else {
            None
        };
    }
    out
}

/// MACD line and its signal line
#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
}

impl MacdSeries {
    /// True if MACD crossed its signal line between the last two values.
    pub fn crossed_last_bar(&self) -> bool {
        let n = self.macd.len();
        if n < 2 || self.signal.len() != n {
            return false;
        }
        let (m0, s0) = (self.macd[n - 2], self.signal[n - 2]);
        let (m1, s1) = (self.macd[n - 1], self.signal[n - 1]);
        (m0 < s0 && m1 > s1) || (m0 > s0 && m1 < s1)
    }
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    MacdSeries {
        macd: line,
        signal: signal_line,
    }
}

// ============================================================
// VOLATILITY
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBand {
    /// Position of `price` inside the band: 0.0 at the lower band, 1.0 at the upper.
    /// `None` when the band has zero width.
    pub fn position(&self, price: f64) -> Option<f64> {
        let width = self.upper - self.lower;
        (width > f64::EPSILON).then(|| (price - self.lower) / width)
    }
}

/// Bollinger Bands: SMA(`period`) ± `k` sample standard deviations.
pub fn bollinger(values: &[f64], period: usize, k: f64) -> Vec<Option<BollingerBand>> {
    let mut out = vec![None; values.len()];
    if period < 2 || values.len() < period {
        return out;
    }
    for (i, window) in values.windows(period).enumerate() {
        let middle = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / (period - 1) as f64;
        let sd = var.sqrt();
        out[i + period - 1] = Some(BollingerBand {
            upper: middle + k * sd,
            middle,
            lower: middle - k * sd,
        });
    }
    out
}

/// True range per bar; the first bar uses its high-low range.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;
    for bar in bars {
        let hl = bar.high() - bar.low();
        let tr = match prev_close {
            Some(pc) => hl.max((bar.high() - pc).abs()).max((bar.low() - pc).abs()),
            None => hl,
        };
        out.push(tr);
        prev_close = Some(bar.close());
    }
    out
}

/// Average True Range with Wilder smoothing.
///
/// The first value (at index `period - 1`) is the simple mean of the first
/// `period` true ranges; later values are `(prev * (period - 1) + tr) / period`.
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(bars);
    let mut out = vec![None; tr.len()];
    if period == 0 || tr.len() < period {
        return out;
    }
    let mut prev = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);
    for i in period..tr.len() {
        prev = (prev * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = Some(prev);
    }
    out
}

/// ATR at the last bar, if defined.
pub fn last_atr<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    atr(bars, period).last().copied().flatten()
}

// ============================================================
// STATISTICS & LINE FITTING
// ============================================================

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Least-squares line `y = slope * x + intercept` over `x = 0, 1, ..`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    #[inline]
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// X coordinate where this line meets `other`, if the lines are not parallel
    /// within `min_slope_gap`.
    pub fn intersect_x(&self, other: &LineFit, min_slope_gap: f64) -> Option<f64> {
        let gap = self.slope - other.slope;
        (gap.abs() > min_slope_gap).then(|| (other.intercept - self.intercept) / gap)
    }
}

/// Fit a line to `values` indexed by position. `None` for fewer than two points
/// or non-finite input.
pub fn linear_fit(values: &[f64]) -> Option<LineFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values)?;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    (slope.is_finite() && intercept.is_finite()).then_some(LineFit { slope, intercept })
}

// ============================================================
// SERIES SNAPSHOT
// ============================================================

/// Indicator periods used for confidence confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub volume_period: usize,
    pub volume_recent: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
            volume_period: 20,
            volume_recent: 5,
        }
    }
}

/// Indicator readings at the last bar of a series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    /// Last close inside the Bollinger band, 0.0 = lower band, 1.0 = upper band
    pub bollinger_position: Option<f64>,
    pub macd_crossover: bool,
    /// Mean of the recent volumes divided by the rolling volume mean
    pub volume_ratio: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn compute<T: OHLCV>(bars: &[T], params: &IndicatorParams) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();
        let last_close = match closes.last() {
            Some(&c) => c,
            None => return Self::default(),
        };

        let rsi = rsi(&closes, params.rsi_period).last().copied().flatten();
        let bollinger_position = bollinger(&closes, params.bollinger_period, params.bollinger_k)
            .last()
            .copied()
            .flatten()
            .and_then(|band| band.position(last_close));
        let macd_crossover =
            macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal).crossed_last_bar();

        let volume_ratio = sma(&volumes, params.volume_period)
            .last()
            .copied()
            .flatten()
            .zip(mean(&volumes[volumes.len().saturating_sub(params.volume_recent)..]))
            .and_then(|(rolling, recent)| (rolling > 0.0).then(|| recent / rolling));

        Self {
            rsi,
            bollinger_position,
            macd_crossover,
            volume_ratio,
        }
    }
}
