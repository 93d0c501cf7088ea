use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Candle;

/// Taker side of a trade or forced order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY", alias = "buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `/fapi/v1/premiumIndex` payload: mark price and funding schedule.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Mark-Price>
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
pub struct PremiumIndex {
    #[serde(rename = "markPrice", deserialize_with = "crate::de::de_str")]
    pub mark_price: f64,
    #[serde(rename = "lastFundingRate", deserialize_with = "crate::de::de_str")]
    pub last_funding_rate: f64,
    #[serde(
        rename = "nextFundingTime",
        deserialize_with = "crate::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub next_funding_time: DateTime<Utc>,
}

/// One order book level as delivered: a `["price", "qty"]` string pair.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct DepthLevel(
    #[serde(deserialize_with = "crate::de::de_str")] pub f64,
    #[serde(deserialize_with = "crate::de::de_str")] pub f64,
);

impl DepthLevel {
    pub fn price(&self) -> f64 {
        self.0
    }

    pub fn quantity(&self) -> f64 {
        self.1
    }
}

/// `/fapi/v1/depth` payload. Bids arrive sorted by price descending, asks
/// ascending; the first element of each side is top-of-book.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Order-Book>
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// `/fapi/v1/ticker/24hr` payload, reduced to the consumed field.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/24hr-Ticker-Price-Change-Statistics>
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
pub struct Ticker24h {
    #[serde(rename = "quoteVolume", deserialize_with = "crate::de::de_str")]
    pub quote_volume: f64,
}

/// One `/fapi/v1/aggTrades` (or spot `/api/v3/aggTrades`) entry.
///
/// `m == true` means the buyer was the resting maker, i.e. the aggressor
/// sold.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Compressed-Aggregate-Trades-List>
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct AggTrade {
    #[serde(rename = "p", deserialize_with = "crate::de::de_str")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "crate::de::de_str")]
    pub quantity: f64,
    #[serde(
        rename = "T",
        deserialize_with = "crate::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

impl AggTrade {
    /// Quote notional of the print.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// One `/futures/data/openInterestHist` entry.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Open-Interest-Statistics>
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
pub struct OpenInterestHist {
    #[serde(rename = "sumOpenInterest", deserialize_with = "crate::de::de_str")]
    pub sum_open_interest: f64,
    #[serde(
        rename = "sumOpenInterestValue",
        deserialize_with = "crate::de::de_str"
    )]
    pub sum_open_interest_value: f64,
    #[serde(
        rename = "timestamp",
        deserialize_with = "crate::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
}

/// `/fapi/v1/klines` response row.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/market-data/rest-api/Kline-Candlestick-Data>
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct BinanceKline(
    pub i64,                                                  // 0: Open time
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 1: Open
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 2: High
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 3: Low
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 4: Close
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 5: Volume
    pub i64,                                                  // 6: Close time
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 7: Quote asset volume
    pub i64,                                                  // 8: Number of trades
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 9: Taker buy base asset volume
    #[serde(deserialize_with = "crate::de::de_str")] pub f64, // 10: Taker buy quote asset volume
    pub String,                                               // 11: Ignore
);

impl BinanceKline {
    /// Taker buy minus taker sell quote volume within the candle, the
    /// per-candle flow delta used by absorption detection.
    pub fn taker_delta_quote(&self) -> f64 {
        2.0 * self.10 - self.7
    }
}

impl From<BinanceKline> for Candle {
    fn from(kline: BinanceKline) -> Self {
        Candle {
            open_time: kline.0,
            open: kline.1,
            high: kline.2,
            low: kline.3,
            close: kline.4,
            volume: kline.5,
            absorption: None,
        }
    }
}

/// Liquidation ("force order") event from `!forceOrder@arr`.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams/All-Market-Liquidation-Order-Streams>
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct ForceOrderEvent {
    #[serde(
        rename = "E",
        deserialize_with = "crate::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
    #[serde(rename = "o")]
    pub order: ForceOrder,
}

/// Order details nested inside a [`ForceOrderEvent`].
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct ForceOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "q", deserialize_with = "crate::de::de_str")]
    pub quantity: f64,
    #[serde(rename = "ap", deserialize_with = "crate::de::de_str")]
    pub average_price: f64,
}

impl ForceOrder {
    /// Liquidated notional in quote units.
    pub fn value(&self) -> f64 {
        self.average_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_premium_index() {
        let input = r#"{
            "symbol": "BTCUSDT",
            "markPrice": "11793.63104562",
            "indexPrice": "11781.80495970",
            "lastFundingRate": "0.00038246",
            "interestRate": "0.00010000",
            "nextFundingTime": 1597392000000,
            "time": 1597370495002
        }"#;

        let actual = serde_json::from_str::<PremiumIndex>(input).unwrap();
        assert_eq!(actual.mark_price, 11793.63104562);
        assert_eq!(actual.last_funding_rate, 0.00038246);
        assert_eq!(actual.next_funding_time.timestamp_millis(), 1597392000000);
    }

    #[test]
    fn test_de_depth_snapshot() {
        let input = r#"{
            "lastUpdateId": 1027024,
            "E": 1589436922972,
            "T": 1589436922959,
            "bids": [["4.00000000", "431.00000000"], ["3.99000000", "10.00000000"]],
            "asks": [["4.00000200", "12.00000000"]]
        }"#;

        let actual = serde_json::from_str::<DepthSnapshot>(input).unwrap();
        assert_eq!(actual.bids.len(), 2);
        assert_eq!(actual.bids[0].price(), 4.0);
        assert_eq!(actual.bids[0].quantity(), 431.0);
        assert_eq!(actual.asks[0].quantity(), 12.0);
    }

    #[test]
    fn test_de_agg_trade() {
        let input = r#"{
            "a": 26129,
            "p": "0.01633102",
            "q": "4.70443515",
            "f": 27781,
            "l": 27781,
            "T": 1498793709153,
            "m": true
        }"#;

        let actual = serde_json::from_str::<AggTrade>(input).unwrap();
        assert!(actual.buyer_is_maker);
        assert!((actual.notional() - 0.01633102 * 4.70443515).abs() < 1e-12);
    }

    #[test]
    fn test_de_kline_row() {
        let input = r#"[
            1499040000000,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1499644799999,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "17928899.62484339"
        ]"#;

        let kline = serde_json::from_str::<BinanceKline>(input).unwrap();
        // Taker buy quote 28.46694368 out of 2434.19055334 total.
        let expected_delta = 2.0 * 28.46694368 - 2434.19055334;
        assert!((kline.taker_delta_quote() - expected_delta).abs() < 1e-9);

        let candle = Candle::from(kline);
        assert_eq!(candle.open_time, 1499040000000);
        assert_eq!(candle.open, 0.01634790);
        assert_eq!(candle.high, 0.80000000);
        assert_eq!(candle.low, 0.01575800);
        assert_eq!(candle.close, 0.01577100);
        assert_eq!(candle.volume, 148976.11427815);
        assert_eq!(candle.absorption, None);
    }

    #[test]
    fn test_de_force_order_event() {
        let input = r#"{
            "e": "forceOrder",
            "E": 1568014460893,
            "o": {
                "s": "BTCUSDT",
                "S": "SELL",
                "o": "LIMIT",
                "f": "IOC",
                "q": "0.014",
                "p": "9910",
                "ap": "9910",
                "X": "FILLED",
                "l": "0.014",
                "z": "0.014",
                "T": 1568014460893
            }
        }"#;

        let actual = serde_json::from_str::<ForceOrderEvent>(input).unwrap();
        assert_eq!(actual.order.symbol, "BTCUSDT");
        assert_eq!(actual.order.side, Side::Sell);
        assert!((actual.order.value() - 9910.0 * 0.014).abs() < 1e-9);
    }

    #[test]
    fn test_de_open_interest_hist() {
        let input = r#"[
            {
                "symbol": "BTCUSDT",
                "sumOpenInterest": "20403.63700000",
                "sumOpenInterestValue": "150570784.07809979",
                "timestamp": 1583127900000
            },
            {
                "symbol": "BTCUSDT",
                "sumOpenInterest": "20401.36700000",
                "sumOpenInterestValue": "149940752.14464448",
                "timestamp": 1583128200000
            }
        ]"#;

        let actual = serde_json::from_str::<Vec<OpenInterestHist>>(input).unwrap();
        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0].sum_open_interest, 20403.637);
        assert_eq!(actual[1].time.timestamp_millis(), 1583128200000);
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(Side::Buy.as_str(), "BUY");
        assert_eq!(Side::Sell.as_str(), "SELL");
        assert!(Side::Buy.is_buy());
        assert!(Side::Sell.is_sell());
        assert_eq!(serde_json::from_str::<Side>(r#""SELL""#).unwrap(), Side::Sell);
    }
}
