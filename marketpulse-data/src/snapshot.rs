use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    analytics::{book::OrderBookReport, indicators::IndicatorSet, profile::VolumeProfile},
    liquidation::LiquidationTotals,
};

/// One OHLCV candle as published in the snapshot.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Wick/contrary-flow absorption flag; only candles of the designated
    /// absorption timeframe carry it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub absorption: Option<bool>,
}

impl Candle {
    /// Close above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Snapshot `derivatives` block: open interest and funding.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Derivatives {
    /// Latest open interest valued at the cycle's `current_price`.
    pub open_interest_usd: f64,
    /// Latest open interest in base units.
    pub open_interest_coin: f64,
    /// Open interest change over the trailing 4h window, percent.
    pub oi_change_4h_pct: f64,
    pub funding_rate: f64,
    /// Next funding settlement time.
    pub funding_next: DateTime<Utc>,
    /// Funding rates of the last few cycles, oldest first.
    pub funding_history: Vec<f64>,
}

/// Snapshot `stats` block: 24h quote volume and its estimated taker split.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct VolumeStats {
    pub volume_24h: f64,
    pub taker_buy_vol_24h: f64,
    pub taker_sell_vol_24h: f64,
}

/// Candles plus derived analytics for one timeframe.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TimeframeReport {
    pub candles: Vec<Candle>,
    pub indicators: IndicatorSet,
    /// Volume profile, present only on the designated profile timeframe. The
    /// serialised key is fixed by the downstream contract even though the
    /// designation is configurable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume_profile_4h: Option<VolumeProfile>,
}

/// Snapshot `flow` block: sample CVD plus the cross-cycle delta history.
///
/// `perp_cvd` and `spot_cvd` are sample-window statistics recomputed fresh
/// each cycle from the bounded trade sample, NOT accumulated across cycles.
/// The cross-cycle series is `delta_volume_cumulative`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FlowReport {
    pub perp_cvd: f64,
    /// Spot sample CVD; `null` when the spot fetch failed.
    pub spot_cvd: Option<f64>,
    pub perp_buy_volume_sample: f64,
    pub perp_sell_volume_sample: f64,
    pub spot_buy_volume_sample: Option<f64>,
    pub spot_sell_volume_sample: Option<f64>,
    /// This cycle's `taker_buy_24h - taker_sell_24h`.
    pub delta_volume_absolute: f64,
    /// Per-cycle deltas, oldest first.
    pub delta_volume_cumulative: Vec<f64>,
}

/// Immutable result of one collection cycle.
///
/// Field names and nesting are a downstream contract. The optional
/// `liquidations` and `flow` blocks are omitted entirely when their source
/// was unavailable during the cycle; `spot_*` fields inside `flow` are
/// `null` when only the spot side failed.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Cycle wall-clock time.
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    /// Mark price fetched at the start of the cycle; every USD conversion in
    /// the snapshot uses this one price.
    pub current_price: f64,
    pub order_book: OrderBookReport,
    pub derivatives: Derivatives,
    pub stats: VolumeStats,
    /// Trailing VWAP per timeframe that reports one, keyed `"1h"`, `"4h"`,
    /// `"d"`; `null` per entry when uncomputable.
    pub vwap: IndexMap<String, Option<f64>>,
    /// Per-timeframe candles and analytics, keyed `"15m"`/`"1h"`/`"4h"`/`"1d"`.
    pub timeframes: IndexMap<String, TimeframeReport>,
    /// Rolling 24h liquidation totals; absent when the stream was not
    /// connected during the cycle.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub liquidations: Option<LiquidationTotals>,
    /// Taker flow sample; absent when the perp trade sample was unavailable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flow: Option<FlowReport>,
}
