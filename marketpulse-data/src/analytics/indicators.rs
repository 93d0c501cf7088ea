//! Technical indicators over one candle series.
//!
//! The output shape is fixed: every configured key is always present and
//! `null` until its window is filled, so downstream consumers never branch
//! on key existence.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{config::IndicatorParams, snapshot::Candle};

/// Per-timeframe indicator values, serialised under the snapshot's
/// `indicators` key.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// `sma_<window>` per configured window.
    pub sma: IndexMap<String, Option<f64>>,
    /// `ema_<window>` per configured window.
    pub ema: IndexMap<String, Option<f64>>,
    /// `rsi_<window>` for the configured window.
    pub rsi: IndexMap<String, Option<f64>>,
    pub macd: MacdValues,
    pub bollinger: BollingerBands,
    pub atr: AtrValue,
}

/// MACD line, signal and histogram.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct MacdValues {
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
}

/// Bollinger band levels and relative width.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct BollingerBands {
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
}

/// Average true range.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct AtrValue {
    pub atr: Option<f64>,
}

/// Compute the full indicator set for one candle series.
pub fn indicator_set(candles: &[Candle], params: &IndicatorParams) -> IndicatorSet {
    let closes: Vec<f64> = candles.iter().map(|candle| candle.close).collect();

    let sma_values = params
        .sma
        .iter()
        .map(|&window| (format!("sma_{window}"), sma(&closes, window)))
        .collect();
    let ema_values = params
        .ema
        .iter()
        .map(|&window| (format!("ema_{window}"), ema(&closes, window)))
        .collect();
    let mut rsi_values = IndexMap::with_capacity(1);
    rsi_values.insert(format!("rsi_{}", params.rsi), rsi(&closes, params.rsi));

    IndicatorSet {
        sma: sma_values,
        ema: ema_values,
        rsi: rsi_values,
        macd: macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal),
        bollinger: bollinger(&closes, params.bollinger_window, params.bollinger_k),
        atr: AtrValue {
            atr: atr(candles, params.atr),
        },
    }
}

/// Arithmetic mean of the last `window` closes.
pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// Exponential moving average of the latest close.
///
/// Seeded with the SMA of the first `window` closes, then
/// `ema = alpha * close + (1 - alpha) * ema` with `alpha = 2 / (window + 1)`.
pub fn ema(closes: &[f64], window: usize) -> Option<f64> {
    ema_series(closes, window).and_then(|series| series.last().copied())
}

/// EMA value at every index from `window - 1` on.
fn ema_series(values: &[f64], window: usize) -> Option<Vec<f64>> {
    if window == 0 || values.len() < window {
        return None;
    }
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut current = values[..window].iter().sum::<f64>() / window as f64;
    let mut series = Vec::with_capacity(values.len() - window + 1);
    series.push(current);
    for value in &values[window..] {
        current = alpha * value + (1.0 - alpha) * current;
        series.push(current);
    }
    Some(series)
}

/// Wilder relative strength index over close-to-close changes.
///
/// First averages are the simple mean of the first `window` gains/losses,
/// continued with `avg = (avg * (window - 1) + change) / window`. 100 when
/// the average loss is zero. Needs `window + 1` closes.
pub fn rsi(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for pair in closes[..window + 1].windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= window as f64;
    avg_loss /= window as f64;

    for pair in closes[window..].windows(2) {
        let change = pair[1] - pair[0];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (window as f64 - 1.0) + gain) / window as f64;
        avg_loss = (avg_loss * (window as f64 - 1.0) + loss) / window as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line (`EMA fast - EMA slow`), its signal EMA and histogram.
///
/// The signal is the EMA of the MACD series itself, so it needs
/// `slow + signal - 1` closes; the line alone needs `slow`.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdValues {
    let (Some(fast_series), Some(slow_series)) =
        (ema_series(closes, fast), ema_series(closes, slow))
    else {
        return MacdValues::default();
    };
    let Some(offset) = fast_series.len().checked_sub(slow_series.len()) else {
        return MacdValues::default();
    };

    let macd_series: Vec<f64> = slow_series
        .iter()
        .zip(&fast_series[offset..])
        .map(|(slow_value, fast_value)| fast_value - slow_value)
        .collect();

    let macd_line = macd_series.last().copied();
    let signal_line = ema_series(&macd_series, signal).and_then(|series| series.last().copied());
    let histogram = match (macd_line, signal_line) {
        (Some(line), Some(signal_value)) => Some(line - signal_value),
        _ => None,
    };

    MacdValues {
        macd: macd_line,
        macd_signal: signal_line,
        macd_hist: histogram,
    }
}

/// Bollinger bands: SMA of the last `window` closes plus/minus `k`
/// population standard deviations. Width is `(upper - lower) / middle`,
/// `None` when the middle band is zero.
pub fn bollinger(closes: &[f64], window: usize, k: f64) -> BollingerBands {
    if window == 0 || closes.len() < window {
        return BollingerBands::default();
    }
    let tail = &closes[closes.len() - window..];
    let middle = tail.iter().sum::<f64>() / window as f64;
    let variance = tail
        .iter()
        .map(|close| (close - middle).powi(2))
        .sum::<f64>()
        / window as f64;
    let sigma = variance.sqrt();

    let upper = middle + k * sigma;
    let lower = middle - k * sigma;
    let width = if middle != 0.0 {
        Some((upper - lower) / middle)
    } else {
        None
    };

    BollingerBands {
        bb_upper: Some(upper),
        bb_middle: Some(middle),
        bb_lower: Some(lower),
        bb_width: width,
    }
}

/// Wilder average true range. Needs `window + 1` candles for `window` true
/// ranges.
pub fn atr(candles: &[Candle], window: usize) -> Option<f64> {
    if window == 0 || candles.len() < window + 1 {
        return None;
    }
    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .collect();

    let mut average = ranges[..window].iter().sum::<f64>() / window as f64;
    for range in &ranges[window..] {
        average = (average * (window as f64 - 1.0) + range) / window as f64;
    }
    Some(average)
}

fn true_range(candle: &Candle, previous_close: f64) -> f64 {
    (candle.high - candle.low)
        .max((candle.high - previous_close).abs())
        .max((candle.low - previous_close).abs())
}

/// Typical-price VWAP over the trailing `window` candles.
///
/// `None` when the series is empty or the window's volume sums to zero.
pub fn vwap(candles: &[Candle], window: usize) -> Option<f64> {
    if candles.is_empty() || window == 0 {
        return None;
    }
    let start = candles.len().saturating_sub(window);

    let mut price_volume = 0.0;
    let mut volume = 0.0;
    for candle in &candles[start..] {
        let typical = (candle.high + candle.low + candle.close) / 3.0;
        price_volume += typical * candle.volume;
        volume += candle.volume;
    }

    if volume > 0.0 {
        Some(price_volume / volume)
    } else {
        None
    }
}
