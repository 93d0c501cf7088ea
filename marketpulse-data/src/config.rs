use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

/// Candle intervals the engine collects, in collection order.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Kline-Candlestick-Data>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Snapshot key and Binance `interval` request parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Key used inside the snapshot `vwap` map. The daily entry is labelled
    /// `d` rather than `1d` by downstream contract.
    pub fn vwap_label(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" | "d" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

/// Retry schedule applied to every REST request.
///
/// `max_retries` counts total attempts, so the default performs at most two
/// backoff sleeps (1s then 2s) before the third and final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request.
    pub max_retries: usize,
    /// Sleep before the first re-attempt.
    pub initial_backoff: Duration,
    /// Ceiling for the doubling backoff.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
        }
    }
}

/// Window parameters for the per-timeframe indicator set.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    /// Simple moving average windows.
    pub sma: Vec<usize>,
    /// Exponential moving average windows.
    pub ema: Vec<usize>,
    /// Relative strength index window.
    pub rsi: usize,
    /// MACD fast EMA window.
    pub macd_fast: usize,
    /// MACD slow EMA window.
    pub macd_slow: usize,
    /// MACD signal EMA window.
    pub macd_signal: usize,
    /// Bollinger moving average window.
    pub bollinger_window: usize,
    /// Bollinger band width in standard deviations.
    pub bollinger_k: f64,
    /// Average true range window.
    pub atr: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma: vec![20, 50, 200],
            ema: vec![9, 21, 50],
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_window: 20,
            bollinger_k: 2.0,
            atr: 14,
        }
    }
}

/// Engine configuration.
///
/// The library never reads the environment; binaries map whatever
/// configuration surface they expose onto this struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Instrument symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// USD-M futures REST base URL.
    pub futures_base_url: String,
    /// Spot REST base URL (best-effort spot CVD only).
    pub spot_base_url: String,
    /// Liquidation (force order) stream URL.
    pub liquidation_ws_url: String,
    /// REST retry schedule.
    pub retry: RetryPolicy,
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    /// Order book levels fetched per side.
    pub depth_limit: usize,
    /// Order book levels kept in the snapshot `top` block.
    pub book_display_levels: usize,
    /// Percentage thresholds for cumulative depth buckets.
    pub depth_levels: Vec<f64>,
    /// Candles fetched per timeframe.
    pub kline_limit: usize,
    /// Aggregated trades fetched per CVD sample.
    pub trade_sample_limit: usize,
    /// Timeframes collected each cycle.
    pub timeframes: Vec<Timeframe>,
    /// Indicator windows.
    pub indicators: IndicatorParams,
    /// Trailing candle count for VWAP, per timeframe that reports one.
    pub vwap_windows: Vec<(Timeframe, usize)>,
    /// Timeframe whose candle series feeds the volume profile.
    pub profile_timeframe: Timeframe,
    /// Number of equal-width volume profile buckets.
    pub profile_bins: usize,
    /// Timeframe whose candles carry per-candle absorption flags.
    pub absorption_timeframe: Timeframe,
    /// Funding rate history capacity.
    pub funding_history_limit: usize,
    /// Delta volume history capacity.
    pub delta_history_limit: usize,
    /// Rolling window of the liquidation ledger.
    pub liquidation_window: Duration,
    /// Fixed delay between liquidation stream reconnect attempts.
    pub reconnect_delay: Duration,
    /// How long a cycle waits for stream connectivity before declaring
    /// liquidations unavailable.
    pub connection_wait: Duration,
    /// Open interest history sampling period.
    pub oi_period: String,
    /// Open interest history points (49 x 5m spans the trailing 4h).
    pub oi_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            futures_base_url: "https://fapi.binance.com".to_string(),
            spot_base_url: "https://api.binance.com".to_string(),
            liquidation_ws_url: "wss://fstream.binance.com/ws/!forceOrder@arr".to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            depth_limit: 500,
            book_display_levels: 20,
            depth_levels: vec![0.5, 1.0, 2.0],
            kline_limit: 50,
            trade_sample_limit: 1000,
            timeframes: vec![Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1],
            indicators: IndicatorParams::default(),
            vwap_windows: vec![(Timeframe::H1, 24), (Timeframe::H4, 30), (Timeframe::D1, 14)],
            profile_timeframe: Timeframe::H4,
            profile_bins: 20,
            absorption_timeframe: Timeframe::M15,
            funding_history_limit: 3,
            delta_history_limit: 50,
            liquidation_window: Duration::from_secs(24 * 60 * 60),
            reconnect_delay: Duration::from_secs(5),
            connection_wait: Duration::from_secs(5),
            oi_period: "5m".to_string(),
            oi_limit: 49,
        }
    }
}

impl EngineConfig {
    /// Create a configuration for the given symbol with default settings.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Set the collected timeframes.
    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.timeframes = timeframes;
        self
    }

    /// Set the retry schedule.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the depth bucket thresholds.
    pub fn with_depth_levels(mut self, levels: Vec<f64>) -> Self {
        self.depth_levels = levels;
        self
    }

    /// Set the liquidation stream reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set how long a cycle may wait for first stream connectivity.
    pub fn with_connection_wait(mut self, wait: Duration) -> Self {
        self.connection_wait = wait;
        self
    }

    /// Trailing VWAP window (in candles) for every timeframe that reports one.
    pub fn vwap_window(&self, timeframe: Timeframe) -> Option<usize> {
        self.vwap_windows
            .iter()
            .find(|(tf, _)| *tf == timeframe)
            .map(|(_, window)| *window)
    }
}
