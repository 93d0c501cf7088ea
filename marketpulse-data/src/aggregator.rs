//! The collection cycle: one strictly sequential pass over every upstream
//! source, assembled into an immutable [`MarketSnapshot`].
//!
//! Required sources (price, book, ticker, open interest, klines) abort the
//! cycle on terminal failure; liquidation totals and trade flow degrade to
//! absent blocks instead. The bounded funding and delta-volume histories
//! live here and survive across cycles.

use std::collections::VecDeque;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    analytics::{book, flow, indicators, profile},
    binance::OpenInterestHist,
    config::EngineConfig,
    error::DataError,
    http::{HttpTransport, ReqwestTransport, RestClient},
    liquidation::{LiquidationStream, LiquidationTotals},
    snapshot::{Candle, Derivatives, FlowReport, MarketSnapshot, TimeframeReport, VolumeStats},
};

/// Owns the REST client, the liquidation stream handle and the cross-cycle
/// histories; produces one [`MarketSnapshot`] per [`collect`] call.
///
/// [`collect`]: MarketDataAggregator::collect
pub struct MarketDataAggregator<T = ReqwestTransport> {
    config: EngineConfig,
    rest: RestClient<T>,
    liquidations: LiquidationStream,
    funding_history: VecDeque<f64>,
    delta_history: VecDeque<f64>,
}

impl MarketDataAggregator<ReqwestTransport> {
    /// Build the production aggregator from `config`.
    pub fn new(config: EngineConfig) -> Result<Self, DataError> {
        let rest = RestClient::new(&config)?;
        let liquidations = LiquidationStream::new(&config);
        Ok(Self::with_parts(config, rest, liquidations))
    }
}

impl<T: HttpTransport> MarketDataAggregator<T> {
    /// Assemble an aggregator from pre-built parts.
    pub fn with_parts(
        config: EngineConfig,
        rest: RestClient<T>,
        liquidations: LiquidationStream,
    ) -> Self {
        Self {
            config,
            rest,
            liquidations,
            funding_history: VecDeque::new(),
            delta_history: VecDeque::new(),
        }
    }

    /// Start the liquidation stream worker.
    pub fn start(&mut self) {
        self.liquidations.start();
    }

    /// Stop the liquidation stream worker.
    pub async fn stop(&mut self) {
        self.liquidations.stop().await;
    }

    /// Run one collection cycle.
    pub async fn collect(&mut self) -> Result<MarketSnapshot, DataError> {
        let symbol = self.config.symbol.clone();
        info!("Collecting market snapshot for {}", symbol);

        let premium = self.rest.premium_index(&symbol).await?;
        let current_price = premium.mark_price;

        let depth = self.rest.depth(&symbol, self.config.depth_limit).await?;
        let order_book = book::analyze(
            &depth,
            current_price,
            &self.config.depth_levels,
            self.config.book_display_levels,
        )?;

        let ticker = self.rest.ticker_24h(&symbol).await?;

        // One perp trade sample serves both the 24h taker split and the flow
        // block; losing it degrades both instead of aborting the cycle.
        let perp_sample = match self
            .rest
            .agg_trades(&symbol, self.config.trade_sample_limit)
            .await
        {
            Ok(trades) => Some(flow::trade_flow(&trades)),
            Err(error) => {
                warn!("Perp trade sample unavailable, degrading flow: {}", error);
                None
            }
        };

        let (taker_buy_24h, taker_sell_24h) = flow::extrapolate_taker_volumes(
            ticker.quote_volume,
            &perp_sample.unwrap_or_default(),
        );
        let stats = VolumeStats {
            volume_24h: ticker.quote_volume,
            taker_buy_vol_24h: taker_buy_24h,
            taker_sell_vol_24h: taker_sell_24h,
        };

        push_bounded(
            &mut self.funding_history,
            premium.last_funding_rate,
            self.config.funding_history_limit,
        );

        let oi_history = self
            .rest
            .open_interest_hist(&symbol, &self.config.oi_period, self.config.oi_limit)
            .await?;
        let open_interest_coin = oi_history
            .last()
            .map(|point| point.sum_open_interest)
            .unwrap_or(0.0);
        let derivatives = Derivatives {
            open_interest_usd: open_interest_coin * current_price,
            open_interest_coin,
            oi_change_4h_pct: oi_change_pct(&oi_history),
            funding_rate: premium.last_funding_rate,
            funding_next: premium.next_funding_time,
            funding_history: self.funding_history.iter().copied().collect(),
        };

        let liquidations = self.liquidation_totals().await;

        let flow_report = match perp_sample {
            Some(perp) => {
                let spot = match self
                    .rest
                    .spot_agg_trades(&symbol, self.config.trade_sample_limit)
                    .await
                {
                    Ok(trades) => Some(flow::trade_flow(&trades)),
                    Err(error) => {
                        warn!("Spot trade sample unavailable: {}", error);
                        None
                    }
                };

                let delta = taker_buy_24h - taker_sell_24h;
                push_bounded(
                    &mut self.delta_history,
                    delta,
                    self.config.delta_history_limit,
                );

                Some(FlowReport {
                    perp_cvd: perp.cvd,
                    spot_cvd: spot.map(|sample| sample.cvd),
                    perp_buy_volume_sample: perp.buy_volume,
                    perp_sell_volume_sample: perp.sell_volume,
                    spot_buy_volume_sample: spot.map(|sample| sample.buy_volume),
                    spot_sell_volume_sample: spot.map(|sample| sample.sell_volume),
                    delta_volume_absolute: delta,
                    delta_volume_cumulative: self.delta_history.iter().copied().collect(),
                })
            }
            None => None,
        };

        let mut vwap = IndexMap::new();
        let mut timeframes = IndexMap::new();
        for &timeframe in &self.config.timeframes {
            let klines = self
                .rest
                .klines(&symbol, timeframe, self.config.kline_limit)
                .await?;

            let flag_absorption = timeframe == self.config.absorption_timeframe;
            let candles: Vec<Candle> = klines
                .into_iter()
                .map(|kline| {
                    let taker_delta = kline.taker_delta_quote();
                    let mut candle = Candle::from(kline);
                    if flag_absorption {
                        candle.absorption = Some(profile::detect_absorption(&candle, taker_delta));
                    }
                    candle
                })
                .collect();

            let indicator_set = indicators::indicator_set(&candles, &self.config.indicators);

            if let Some(window) = self.config.vwap_window(timeframe) {
                vwap.insert(
                    timeframe.vwap_label().to_string(),
                    indicators::vwap(&candles, window),
                );
            }

            let volume_profile_4h = (timeframe == self.config.profile_timeframe)
                .then(|| profile::volume_profile(&candles, self.config.profile_bins));

            timeframes.insert(
                timeframe.as_str().to_string(),
                TimeframeReport {
                    candles,
                    indicators: indicator_set,
                    volume_profile_4h,
                },
            );
        }

        let snapshot = MarketSnapshot {
            timestamp: Utc::now(),
            symbol,
            current_price,
            order_book,
            derivatives,
            stats,
            vwap,
            timeframes,
            liquidations,
            flow: flow_report,
        };
        debug!("Snapshot assembled for {}", snapshot.symbol);
        Ok(snapshot)
    }

    /// Read liquidation totals, waiting briefly for first connectivity.
    /// Connected zeros are real data; a disconnected stream yields `None`.
    async fn liquidation_totals(&self) -> Option<LiquidationTotals> {
        if !self.liquidations.is_connected()
            && !self
                .liquidations
                .wait_for_connection(self.config.connection_wait)
                .await
        {
            warn!("Liquidation stream not connected, omitting liquidation totals");
            return None;
        }
        Some(self.liquidations.totals())
    }
}

/// Percent change from the oldest to the latest open interest sample; 0 with
/// fewer than 2 points or a zero base.
fn oi_change_pct(history: &[OpenInterestHist]) -> f64 {
    let (Some(oldest), Some(latest)) = (history.first(), history.last()) else {
        return 0.0;
    };
    if history.len() < 2 || oldest.sum_open_interest == 0.0 {
        return 0.0;
    }
    (latest.sum_open_interest - oldest.sum_open_interest) / oldest.sum_open_interest * 100.0
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, limit: usize) {
    history.push_back(value);
    while history.len() > limit {
        history.pop_front();
    }
}
