use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{binance::DepthSnapshot, error::DataError};

/// Snapshot `order_book` block.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OrderBookReport {
    pub top: TopOfBook,
    pub depth_pct: DepthBuckets,
    pub imbalance_pct: f64,
    pub spread: f64,
    pub imbalance_score: f64,
}

/// Display slice of the book as `[price, qty]` pairs, exchange order kept.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TopOfBook {
    pub bids: Vec<[f64; 2]>,
    pub asks: Vec<[f64; 2]>,
}

/// Cumulative quantity within a percentage of the best price, per side.
/// Keyed by the percentage rendered as text (`"0.5"`, `"1.0"`, `"2.0"`).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DepthBuckets {
    pub bids: IndexMap<String, f64>,
    pub asks: IndexMap<String, f64>,
}

/// Analyze a raw depth snapshot into the order book report.
///
/// Depth buckets are computed over the FULL fetched depth, independently per
/// side: bid quantity at price >= best_bid x (1 - p/100), ask quantity at
/// price <= best_ask x (1 + p/100). The imbalance percentage always reads the
/// 1% bucket regardless of the configured thresholds.
pub fn analyze(
    depth: &DepthSnapshot,
    current_price: f64,
    depth_levels: &[f64],
    display_levels: usize,
) -> Result<OrderBookReport, DataError> {
    let best_bid = depth
        .bids
        .first()
        .ok_or_else(|| empty_side_error("bids"))?
        .price();
    let best_ask = depth
        .asks
        .first()
        .ok_or_else(|| empty_side_error("asks"))?
        .price();

    let top = TopOfBook {
        bids: depth
            .bids
            .iter()
            .take(display_levels)
            .map(|level| [level.price(), level.quantity()])
            .collect(),
        asks: depth
            .asks
            .iter()
            .take(display_levels)
            .map(|level| [level.price(), level.quantity()])
            .collect(),
    };

    let mut bids = IndexMap::with_capacity(depth_levels.len());
    let mut asks = IndexMap::with_capacity(depth_levels.len());
    for &pct in depth_levels {
        let (bid_volume, ask_volume) = bucket_volumes(depth, best_bid, best_ask, pct);
        bids.insert(bucket_key(pct), bid_volume);
        asks.insert(bucket_key(pct), ask_volume);
    }

    let (bid_1pct, ask_1pct) = bucket_volumes(depth, best_bid, best_ask, 1.0);
    let total_1pct = bid_1pct + ask_1pct;
    let imbalance_pct = if total_1pct > 0.0 {
        ((bid_1pct - ask_1pct) / total_1pct) * 100.0
    } else {
        0.0
    };

    Ok(OrderBookReport {
        top,
        depth_pct: DepthBuckets { bids, asks },
        imbalance_pct,
        spread: best_ask - best_bid,
        imbalance_score: imbalance_score(best_bid, best_ask, current_price),
    })
}

/// Position of the traded price within the spread, signed toward the ask.
///
/// 0 at the midpoint, +1 at or beyond the ask, -1 at or beyond the bid, and
/// 0 whenever the spread is crossed or zero.
pub fn imbalance_score(best_bid: f64, best_ask: f64, current_price: f64) -> f64 {
    let spread = best_ask - best_bid;
    if spread <= 0.0 {
        return 0.0;
    }
    let mid = (best_bid + best_ask) / 2.0;
    ((current_price - mid) / (spread / 2.0)).clamp(-1.0, 1.0)
}

fn bucket_volumes(depth: &DepthSnapshot, best_bid: f64, best_ask: f64, pct: f64) -> (f64, f64) {
    let bid_limit = best_bid * (1.0 - pct / 100.0);
    let ask_limit = best_ask * (1.0 + pct / 100.0);

    let bid_volume = depth
        .bids
        .iter()
        .filter(|level| level.price() >= bid_limit)
        .map(|level| level.quantity())
        .sum();
    let ask_volume = depth
        .asks
        .iter()
        .filter(|level| level.price() <= ask_limit)
        .map(|level| level.quantity())
        .sum();

    (bid_volume, ask_volume)
}

/// Render a percentage threshold the way downstream keys expect: whole
/// numbers keep one decimal (`1.0`, not `1`).
fn bucket_key(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.1}")
    } else {
        pct.to_string()
    }
}

fn empty_side_error(side: &str) -> DataError {
    DataError::MalformedPayload {
        context: "order book".to_string(),
        message: format!("empty {side} side"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binance::DepthLevel;

    fn depth_fixture() -> DepthSnapshot {
        // Best bid 100, best ask 101; levels spaced ~0.5% apart per side.
        DepthSnapshot {
            last_update_id: 1,
            bids: vec![
                DepthLevel(100.0, 1.0),
                DepthLevel(99.6, 2.0),
                DepthLevel(99.1, 3.0),
                DepthLevel(98.2, 4.0),
                DepthLevel(97.0, 5.0),
            ],
            asks: vec![
                DepthLevel(101.0, 1.5),
                DepthLevel(101.4, 2.5),
                DepthLevel(101.9, 3.5),
                DepthLevel(102.8, 4.5),
                DepthLevel(104.0, 5.5),
            ],
        }
    }

    #[test]
    fn test_depth_buckets() {
        let report = analyze(&depth_fixture(), 100.5, &[0.5, 1.0, 2.0], 20).unwrap();

        // 0.5%: bids >= 99.5 -> 1+2; asks <= 101.505 -> 1.5+2.5
        assert_eq!(report.depth_pct.bids["0.5"], 3.0);
        assert_eq!(report.depth_pct.asks["0.5"], 4.0);
        // 1.0%: bids >= 99.0 -> 1+2+3; asks <= 102.01 -> 1.5+2.5+3.5
        assert_eq!(report.depth_pct.bids["1.0"], 6.0);
        assert_eq!(report.depth_pct.asks["1.0"], 7.5);
        // 2.0%: bids >= 98.0 -> 1+2+3+4; asks <= 103.02 -> 1.5+2.5+3.5+4.5
        assert_eq!(report.depth_pct.bids["2.0"], 10.0);
        assert_eq!(report.depth_pct.asks["2.0"], 12.0);

        assert_eq!(report.spread, 1.0);
    }

    #[test]
    fn test_depth_monotonic_growth() {
        let report = analyze(&depth_fixture(), 100.5, &[0.5, 1.0, 2.0], 20).unwrap();

        let bid_05 = report.depth_pct.bids["0.5"];
        let bid_10 = report.depth_pct.bids["1.0"];
        let bid_20 = report.depth_pct.bids["2.0"];
        assert!(bid_05 <= bid_10 && bid_10 <= bid_20);

        let ask_05 = report.depth_pct.asks["0.5"];
        let ask_10 = report.depth_pct.asks["1.0"];
        let ask_20 = report.depth_pct.asks["2.0"];
        assert!(ask_05 <= ask_10 && ask_10 <= ask_20);
    }

    #[test]
    fn test_imbalance_pct() {
        let report = analyze(&depth_fixture(), 100.5, &[1.0], 20).unwrap();
        // bid 6.0 vs ask 7.5 at 1%
        let expected = ((6.0 - 7.5) / 13.5) * 100.0;
        assert!((report.imbalance_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn test_imbalance_pct_zero_denominator() {
        // No level within 1% of the best on either side.
        let depth = DepthSnapshot {
            last_update_id: 1,
            bids: vec![DepthLevel(100.0, 0.0)],
            asks: vec![DepthLevel(101.0, 0.0)],
        };
        let report = analyze(&depth, 100.5, &[1.0], 20).unwrap();
        assert_eq!(report.imbalance_pct, 0.0);
    }

    #[test]
    fn test_top_display_truncation() {
        let report = analyze(&depth_fixture(), 100.5, &[1.0], 3).unwrap();
        assert_eq!(report.top.bids.len(), 3);
        assert_eq!(report.top.asks.len(), 3);
        assert_eq!(report.top.bids[0], [100.0, 1.0]);
        assert_eq!(report.top.asks[0], [101.0, 1.5]);
    }

    #[test]
    fn test_empty_side_is_malformed() {
        let depth = DepthSnapshot {
            last_update_id: 1,
            bids: vec![],
            asks: vec![DepthLevel(101.0, 1.0)],
        };
        let error = analyze(&depth, 100.5, &[1.0], 20).unwrap_err();
        assert!(error.is_terminal());
    }

    #[test]
    fn test_imbalance_score() {
        struct TestCase {
            best_bid: f64,
            best_ask: f64,
            current_price: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: midpoint scores zero
                best_bid: 100.0,
                best_ask: 101.0,
                current_price: 100.5,
                expected: 0.0,
            },
            TestCase {
                // TC1: at the ask scores +1
                best_bid: 100.0,
                best_ask: 101.0,
                current_price: 101.0,
                expected: 1.0,
            },
            TestCase {
                // TC2: at the bid scores -1
                best_bid: 100.0,
                best_ask: 101.0,
                current_price: 100.0,
                expected: -1.0,
            },
            TestCase {
                // TC3: beyond the ask clamps to +1
                best_bid: 100.0,
                best_ask: 101.0,
                current_price: 150.0,
                expected: 1.0,
            },
            TestCase {
                // TC4: below the bid clamps to -1
                best_bid: 100.0,
                best_ask: 101.0,
                current_price: 50.0,
                expected: -1.0,
            },
            TestCase {
                // TC5: crossed book scores zero
                best_bid: 101.0,
                best_ask: 100.0,
                current_price: 100.5,
                expected: 0.0,
            },
            TestCase {
                // TC6: zero spread scores zero
                best_bid: 100.0,
                best_ask: 100.0,
                current_price: 100.0,
                expected: 0.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = imbalance_score(test.best_bid, test.best_ask, test.current_price);
            assert!(
                (actual - test.expected).abs() < 1e-9,
                "TC{} failed: actual {} expected {}",
                index,
                actual,
                test.expected
            );
            assert!((-1.0..=1.0).contains(&actual), "TC{} out of bounds", index);
        }
    }

    #[test]
    fn test_bucket_key_formatting() {
        assert_eq!(bucket_key(0.5), "0.5");
        assert_eq!(bucket_key(1.0), "1.0");
        assert_eq!(bucket_key(2.0), "2.0");
        assert_eq!(bucket_key(0.25), "0.25");
    }
}
