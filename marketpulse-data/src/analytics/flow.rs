use serde::{Deserialize, Serialize};

use crate::binance::AggTrade;

/// Signed quote-notional flow over one bounded trade sample.
///
/// The delta is recomputed fresh from each sample and is NOT carried across
/// collection cycles, matching the published `perp_cvd`/`spot_cvd` fields.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct TradeFlow {
    /// Buy notional minus sell notional within the sample.
    pub cvd: f64,
    /// Aggressive buy notional within the sample.
    pub buy_volume: f64,
    /// Aggressive sell notional within the sample.
    pub sell_volume: f64,
}

/// Classify a trade sample into signed flow.
///
/// `buyer_is_maker == true` means the aggressor hit a resting buy order, so
/// the print counts as a sell.
pub fn trade_flow(trades: &[AggTrade]) -> TradeFlow {
    let mut flow = TradeFlow::default();
    for trade in trades {
        let notional = trade.notional();
        if trade.buyer_is_maker {
            flow.sell_volume += notional;
            flow.cvd -= notional;
        } else {
            flow.buy_volume += notional;
            flow.cvd += notional;
        }
    }
    flow
}

/// Split a 24h quote volume into taker buy/sell estimates using the sample
/// buy/sell ratio. Falls back to an even split when the sample is empty.
pub fn extrapolate_taker_volumes(volume_24h: f64, sample: &TradeFlow) -> (f64, f64) {
    let sample_total = sample.buy_volume + sample.sell_volume;
    if sample_total > 0.0 {
        (
            volume_24h * (sample.buy_volume / sample_total),
            volume_24h * (sample.sell_volume / sample_total),
        )
    } else {
        (volume_24h * 0.5, volume_24h * 0.5)
    }
}
