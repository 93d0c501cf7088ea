//! Volume profile binning and absorption detection.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::snapshot::Candle;

/// Share of total volume the value area must cover.
const VALUE_AREA_RATIO: f64 = 0.7;

/// Volume profile landmarks of one candle series.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct VolumeProfile {
    /// Point of control: centre price of the highest-volume bucket.
    pub poc: f64,
    /// Value area high.
    pub vah: f64,
    /// Value area low.
    pub val: f64,
}

/// Bin a candle series into `bins` equal-width price buckets over
/// `[min(low), max(high)]` and locate the point of control and value area.
///
/// Each candle's volume is spread across every bucket its high-low range
/// overlaps, weighted by overlap width; a zero-range candle drops its whole
/// volume into the single bucket containing its price. Buckets are then
/// taken in decreasing volume order until they cover 70% of total volume;
/// VAH/VAL are the highest/lowest bucket centres in that set, so
/// `val <= poc <= vah` by construction. All-zero for fewer than 2 candles,
/// a degenerate price range or zero total volume.
pub fn volume_profile(candles: &[Candle], bins: usize) -> VolumeProfile {
    if candles.len() < 2 || bins == 0 {
        return VolumeProfile::default();
    }

    let range_low = candles
        .iter()
        .map(|candle| candle.low)
        .fold(f64::INFINITY, f64::min);
    let range_high = candles
        .iter()
        .map(|candle| candle.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = range_high - range_low;
    if range <= 0.0 {
        return VolumeProfile::default();
    }
    let width = range / bins as f64;

    let mut volumes = vec![0.0; bins];
    for candle in candles {
        let candle_range = candle.high - candle.low;
        if candle_range <= 0.0 {
            volumes[bucket_index(candle.low, range_low, width, bins)] += candle.volume;
            continue;
        }
        for (index, volume) in volumes.iter_mut().enumerate() {
            let bucket_low = range_low + index as f64 * width;
            let bucket_high = bucket_low + width;
            let overlap = candle.high.min(bucket_high) - candle.low.max(bucket_low);
            if overlap > 0.0 {
                *volume += candle.volume * (overlap / candle_range);
            }
        }
    }

    let total: f64 = volumes.iter().sum();
    if total <= 0.0 {
        return VolumeProfile::default();
    }

    // Highest-volume buckets first; ties keep the lower price bucket first.
    let by_volume: Vec<usize> = (0..bins)
        .sorted_by(|left, right| volumes[*right].total_cmp(&volumes[*left]))
        .collect();

    let mut covered = 0.0;
    let mut value_area = Vec::new();
    for &index in &by_volume {
        value_area.push(index);
        covered += volumes[index];
        if covered >= VALUE_AREA_RATIO * total {
            break;
        }
    }

    let centre = |index: usize| range_low + (index as f64 + 0.5) * width;
    VolumeProfile {
        poc: centre(by_volume[0]),
        vah: centre(value_area.iter().copied().max().unwrap_or_default()),
        val: centre(value_area.iter().copied().min().unwrap_or_default()),
    }
}

fn bucket_index(price: f64, range_low: f64, width: f64, bins: usize) -> usize {
    (((price - range_low) / width) as usize).min(bins - 1)
}

/// Flag a candle where strong contrary flow failed to move price, leaving a
/// dominant wick.
///
/// `cvd_change` is the taker delta over the candle. The larger wick must
/// span at least half of the high-low range and the flow must be strictly
/// opposite the body direction (negative on a green candle, positive on a
/// red one). Zero-range candles, doji and zero flow never flag.
pub fn detect_absorption(candle: &Candle, cvd_change: f64) -> bool {
    let range = candle.high - candle.low;
    if range <= 0.0 {
        return false;
    }

    let body_high = candle.open.max(candle.close);
    let body_low = candle.open.min(candle.close);
    let wick = (candle.high - body_high).max(body_low - candle.low);
    if wick / range < 0.5 {
        return false;
    }

    if candle.is_bullish() {
        cvd_change < 0.0
    } else if candle.is_bearish() {
        cvd_change > 0.0
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume,
            absorption: None,
        }
    }

    #[test]
    fn test_absorption_detection() {
        struct TestCase {
            candle: Candle,
            cvd_change: f64,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: green body [100,101], low 95: wick 5 of range 6,
                // contrary (negative) flow flags
                candle: candle(100.0, 101.0, 95.0, 101.0, 10.0),
                cvd_change: -50.0,
                expected: true,
            },
            TestCase {
                // TC1: same candle with aligned flow does not flag
                candle: candle(100.0, 101.0, 95.0, 101.0, 10.0),
                cvd_change: 50.0,
                expected: false,
            },
            TestCase {
                // TC2: zero flow never flags
                candle: candle(100.0, 101.0, 95.0, 101.0, 10.0),
                cvd_change: 0.0,
                expected: false,
            },
            TestCase {
                // TC3: red candle with a dominant upper wick and positive
                // flow flags
                candle: candle(101.0, 106.0, 100.0, 100.0, 10.0),
                cvd_change: 50.0,
                expected: true,
            },
            TestCase {
                // TC4: red candle with negative (aligned) flow does not
                candle: candle(101.0, 106.0, 100.0, 100.0, 10.0),
                cvd_change: -50.0,
                expected: false,
            },
            TestCase {
                // TC5: doji never flags, wick or not
                candle: candle(100.0, 105.0, 100.0, 100.0, 10.0),
                cvd_change: -50.0,
                expected: false,
            },
            TestCase {
                // TC6: zero-range candle never flags
                candle: candle(100.0, 100.0, 100.0, 100.0, 10.0),
                cvd_change: -50.0,
                expected: false,
            },
            TestCase {
                // TC7: wick exactly half the range meets the threshold
                candle: candle(100.0, 101.0, 99.0, 101.0, 10.0),
                cvd_change: -1.0,
                expected: true,
            },
            TestCase {
                // TC8: small wick does not flag despite contrary flow
                candle: candle(100.0, 101.2, 99.9, 101.0, 10.0),
                cvd_change: -50.0,
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = detect_absorption(&test.candle, test.cvd_change);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_profile_known_buckets() {
        // Range [0, 10], two buckets of width 5. First candle spans the full
        // range (5 volume each side), second sits in the lower bucket.
        let candles = vec![
            candle(1.0, 10.0, 0.0, 9.0, 10.0),
            candle(1.0, 5.0, 0.0, 4.0, 6.0),
        ];
        let profile = volume_profile(&candles, 2);

        // Buckets hold 11 and 5; 70% of 16 needs both.
        assert!((profile.poc - 2.5).abs() < 1e-9);
        assert!((profile.val - 2.5).abs() < 1e-9);
        assert!((profile.vah - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_profile_value_area_collapses_on_dominant_bucket() {
        // 100 of 110 total volume lands in the first of ten buckets.
        let candles = vec![
            candle(0.2, 1.0, 0.0, 0.8, 100.0),
            candle(1.0, 10.0, 0.0, 9.0, 10.0),
        ];
        let profile = volume_profile(&candles, 10);

        assert!((profile.poc - 0.5).abs() < 1e-9);
        assert!((profile.vah - 0.5).abs() < 1e-9);
        assert!((profile.val - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_profile_zero_range_candle_keeps_all_volume() {
        // The flat candle at 9.9 drops its 7 volume into the top bucket.
        let candles = vec![
            candle(1.0, 10.0, 0.0, 9.0, 0.0),
            candle(9.9, 9.9, 9.9, 9.9, 7.0),
        ];
        let profile = volume_profile(&candles, 10);

        assert!((profile.poc - 9.5).abs() < 1e-9);
        assert!((profile.vah - 9.5).abs() < 1e-9);
        assert!((profile.val - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_profile_ordering_invariant() {
        let candles = vec![
            candle(100.0, 104.0, 99.0, 103.0, 12.0),
            candle(103.0, 108.0, 101.0, 102.0, 30.0),
            candle(102.0, 105.0, 97.0, 98.0, 18.0),
            candle(98.0, 103.0, 96.0, 101.0, 25.0),
            candle(101.0, 110.0, 100.0, 109.0, 7.0),
        ];
        let profile = volume_profile(&candles, 20);

        assert!(profile.val <= profile.poc);
        assert!(profile.poc <= profile.vah);
    }

    #[test]
    fn test_profile_degenerate_cases() {
        struct TestCase {
            candles: Vec<Candle>,
            bins: usize,
        }

        let tests = vec![
            TestCase {
                // TC0: a single candle is not a profile
                candles: vec![candle(1.0, 2.0, 0.5, 1.5, 10.0)],
                bins: 20,
            },
            TestCase {
                // TC1: zero-width price range
                candles: vec![
                    candle(5.0, 5.0, 5.0, 5.0, 10.0),
                    candle(5.0, 5.0, 5.0, 5.0, 20.0),
                ],
                bins: 20,
            },
            TestCase {
                // TC2: no volume anywhere
                candles: vec![
                    candle(1.0, 2.0, 0.5, 1.5, 0.0),
                    candle(1.5, 2.5, 1.0, 2.0, 0.0),
                ],
                bins: 20,
            },
            TestCase {
                // TC3: zero buckets requested
                candles: vec![
                    candle(1.0, 2.0, 0.5, 1.5, 10.0),
                    candle(1.5, 2.5, 1.0, 2.0, 20.0),
                ],
                bins: 0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = volume_profile(&test.candles, test.bins);
            assert_eq!(actual, VolumeProfile::default(), "TC{} failed", index);
        }
    }
}
