//! Pure analytics over raw market data: order book depth and imbalance,
//! trade-sample flow, per-timeframe technical indicators, volume profile and
//! absorption detection. Everything here is a function of its inputs; no IO.

pub mod book;
pub mod flow;
pub mod indicators;
pub mod profile;
