//! REST access to the exchange: a thin transport abstraction, the concrete
//! [`reqwest`] transport and the retrying [`RestClient`] with one typed
//! method per consumed endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    binance::{AggTrade, BinanceKline, DepthSnapshot, OpenInterestHist, PremiumIndex, Ticker24h},
    config::{EngineConfig, RetryPolicy, Timeframe},
    error::DataError,
};

/// Minimal GET transport; swapped for a scripted double in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one GET attempt and return the response body on 2xx.
    async fn get(
        &self,
        base_url: &str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, DataError>;
}

/// Production transport backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client enforcing `timeout` per attempt.
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DataError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        base_url: &str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, DataError> {
        let url = format!("{base_url}{endpoint}");
        let response = self.client.get(&url).query(params).send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(DataError::Http {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Which REST host a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseUrl {
    Futures,
    Spot,
}

/// Typed REST client over the futures and spot hosts.
///
/// Every request runs through the same retry loop: transient failures (429,
/// transport, non-2xx) are retried on a doubling backoff until the attempt
/// budget is spent, then surface as [`DataError::RetriesExhausted`]. A 2xx
/// body that fails to decode is [`DataError::MalformedPayload`] immediately,
/// with no retry.
pub struct RestClient<T = ReqwestTransport> {
    transport: T,
    futures_base_url: String,
    spot_base_url: String,
    retry: RetryPolicy,
}

impl RestClient<ReqwestTransport> {
    /// Build the production client from `config`.
    pub fn new(config: &EngineConfig) -> Result<Self, DataError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: HttpTransport> RestClient<T> {
    /// Build a client over an arbitrary transport.
    pub fn with_transport(transport: T, config: &EngineConfig) -> Self {
        Self {
            transport,
            futures_base_url: config.futures_base_url.clone(),
            spot_base_url: config.spot_base_url.clone(),
            retry: config.retry,
        }
    }

    /// Mark price and funding schedule.
    pub async fn premium_index(&self, symbol: &str) -> Result<PremiumIndex, DataError> {
        self.request(
            BaseUrl::Futures,
            "/fapi/v1/premiumIndex",
            &[("symbol", symbol.to_string())],
        )
        .await
    }

    /// Order book snapshot, `limit` levels per side.
    pub async fn depth(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot, DataError> {
        self.request(
            BaseUrl::Futures,
            "/fapi/v1/depth",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Rolling 24h ticker statistics.
    pub async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h, DataError> {
        self.request(
            BaseUrl::Futures,
            "/fapi/v1/ticker/24hr",
            &[("symbol", symbol.to_string())],
        )
        .await
    }

    /// Most recent aggregated perpetual trades.
    pub async fn agg_trades(&self, symbol: &str, limit: usize) -> Result<Vec<AggTrade>, DataError> {
        self.request(
            BaseUrl::Futures,
            "/fapi/v1/aggTrades",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Most recent aggregated spot trades for the same symbol.
    pub async fn spot_agg_trades(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<AggTrade>, DataError> {
        self.request(
            BaseUrl::Spot,
            "/api/v3/aggTrades",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Candles for one timeframe, oldest first.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
    ) -> Result<Vec<BinanceKline>, DataError> {
        self.request(
            BaseUrl::Futures,
            "/fapi/v1/klines",
            &[
                ("symbol", symbol.to_string()),
                ("interval", interval.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Historical open interest samples, oldest first.
    pub async fn open_interest_hist(
        &self,
        symbol: &str,
        period: &str,
        limit: usize,
    ) -> Result<Vec<OpenInterestHist>, DataError> {
        self.request(
            BaseUrl::Futures,
            "/futures/data/openInterestHist",
            &[
                ("symbol", symbol.to_string()),
                ("period", period.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn request<R>(
        &self,
        base: BaseUrl,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<R, DataError>
    where
        R: DeserializeOwned,
    {
        let body = self.get_with_retry(base, endpoint, params).await?;
        serde_json::from_str(&body).map_err(|error| DataError::MalformedPayload {
            context: endpoint.to_string(),
            message: error.to_string(),
        })
    }

    async fn get_with_retry(
        &self,
        base: BaseUrl,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, DataError> {
        let base_url = match base {
            BaseUrl::Futures => &self.futures_base_url,
            BaseUrl::Spot => &self.spot_base_url,
        };

        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.get(base_url, endpoint, params).await {
                Ok(body) => return Ok(body),
                Err(error) if error.is_retryable() && attempt < self.retry.max_retries => {
                    match &error {
                        DataError::RateLimited { .. } => warn!(
                            "Rate limited on {}, attempt {}/{}, backing off for {:?}",
                            endpoint, attempt, self.retry.max_retries, backoff
                        ),
                        _ => warn!(
                            "Request to {} failed ({}), attempt {}/{}, backing off for {:?}",
                            endpoint, error, attempt, self.retry.max_retries, backoff
                        ),
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                }
                Err(error) if error.is_retryable() => {
                    warn!("Giving up on {} after {} attempts: {}", endpoint, attempt, error);
                    return Err(DataError::RetriesExhausted {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        last: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}
