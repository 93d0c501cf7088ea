//! Market data aggregation engine for one Binance USD-M perpetual.
//!
//! Each collection cycle pulls the mark price, order book, 24h statistics,
//! open interest, klines and bounded trade samples over REST, reads the live
//! liquidation ledger fed by the force-order WebSocket stream, derives the
//! analytics (depth buckets, trade flow, technical indicators, volume
//! profile, absorption flags) and assembles everything into one immutable
//! [`MarketSnapshot`].
//!
//! The entry point is [`MarketDataAggregator`]: `start` it once to bring up
//! the liquidation stream, then call `collect` per cycle.

pub mod aggregator;
pub mod analytics;
pub mod binance;
pub mod config;
pub mod de;
pub mod error;
pub mod http;
pub mod liquidation;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use aggregator::MarketDataAggregator;
pub use config::{EngineConfig, IndicatorParams, RetryPolicy, Timeframe};
pub use error::DataError;
pub use http::{HttpTransport, ReqwestTransport, RestClient};
pub use liquidation::{ConnectionStatus, LiquidationStream, LiquidationTotals};
pub use snapshot::{Candle, MarketSnapshot};

pub use analytics::book::OrderBookReport;
pub use analytics::indicators::IndicatorSet;
pub use analytics::profile::VolumeProfile;
