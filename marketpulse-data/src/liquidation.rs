//! Live liquidation accounting over the `!forceOrder@arr` stream.
//!
//! A background worker owns the WebSocket connection and keeps reconnecting
//! until stopped; every forced order lands in a shared rolling-window ledger
//! that collection cycles read through [`LiquidationStream::totals`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::{
    binance::{ForceOrderEvent, Side},
    config::EngineConfig,
    error::DataError,
};

/// How long [`LiquidationStream::stop`] waits for the worker to join before
/// aborting it.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll cadence of [`LiquidationStream::wait_for_connection`].
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection state of the liquidation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

/// Rolling-window liquidation totals in quote units.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct LiquidationTotals {
    /// Notional of liquidated longs (forced sells).
    pub long_liqs_24h: f64,
    /// Notional of liquidated shorts (forced buys).
    pub short_liqs_24h: f64,
    /// Sum of both sides.
    pub total_liqs_24h: f64,
}

/// Accumulated liquidation notionals since `window_start`.
#[derive(Debug, Clone, Copy)]
struct LiquidationLedger {
    long_total: f64,
    short_total: f64,
    combined_total: f64,
    window_start: DateTime<Utc>,
}

impl LiquidationLedger {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            long_total: 0.0,
            short_total: 0.0,
            combined_total: 0.0,
            window_start: now,
        }
    }

    fn apply(&mut self, side: Side, value: f64) {
        // A forced SELL closes a long position, a forced BUY closes a short.
        match side {
            Side::Sell => self.long_total += value,
            Side::Buy => self.short_total += value,
        }
        self.combined_total = self.long_total + self.short_total;
    }

    fn reset_if_expired(&mut self, now: DateTime<Utc>, window: Duration) {
        let elapsed = (now - self.window_start).to_std().unwrap_or(Duration::ZERO);
        if elapsed > window {
            info!("Liquidation window expired, resetting totals");
            *self = Self::new(now);
        }
    }

    fn totals(&self) -> LiquidationTotals {
        LiquidationTotals {
            long_liqs_24h: self.long_total,
            short_liqs_24h: self.short_total,
            total_liqs_24h: self.combined_total,
        }
    }
}

/// Handle to the liquidation stream worker.
///
/// `start` spawns the worker, `stop` shuts it down with a bounded join.
/// Totals and connectivity can be read at any time, started or not.
pub struct LiquidationStream {
    symbol: String,
    url: String,
    window: Duration,
    reconnect_delay: Duration,
    ledger: Arc<Mutex<LiquidationLedger>>,
    running: Arc<AtomicBool>,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown_tx: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl LiquidationStream {
    pub fn new(config: &EngineConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            symbol: config.symbol.clone(),
            url: config.liquidation_ws_url.clone(),
            window: config.liquidation_window,
            reconnect_delay: config.reconnect_delay,
            ledger: Arc::new(Mutex::new(LiquidationLedger::new(Utc::now()))),
            running: Arc::new(AtomicBool::new(false)),
            status_tx,
            status_rx,
            shutdown_tx: None,
            worker: None,
        }
    }

    /// Spawn the stream worker. A second call while running is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Liquidation stream already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let worker = StreamWorker {
            symbol: self.symbol.clone(),
            url: self.url.clone(),
            window: self.window,
            reconnect_delay: self.reconnect_delay,
            ledger: Arc::clone(&self.ledger),
            running: Arc::clone(&self.running),
            status_tx: self.status_tx.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run(shutdown_rx)));
    }

    /// Signal shutdown and wait for the worker, aborting it if the join does
    /// not complete within [`STOP_JOIN_TIMEOUT`]. No-op when not running.
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(mut worker) = self.worker.take() {
            match timeout(STOP_JOIN_TIMEOUT, &mut worker).await {
                Ok(Ok(())) => info!("Liquidation stream stopped"),
                Ok(Err(error)) => warn!("Liquidation stream worker failed to join: {}", error),
                Err(_) => {
                    warn!(
                        "Liquidation stream did not stop within {:?}, aborting",
                        STOP_JOIN_TIMEOUT
                    );
                    worker.abort();
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.status_rx.borrow() == ConnectionStatus::Connected
    }

    /// Poll connectivity for up to `wait`, returning whether the stream was
    /// connected by the deadline.
    pub async fn wait_for_connection(&self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        while tokio::time::Instant::now() < deadline {
            if self.is_connected() {
                return true;
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
        self.is_connected()
    }

    /// Current rolling-window totals. Reads also enforce the window, so an
    /// expired ledger resets even while no liquidations arrive.
    pub fn totals(&self) -> LiquidationTotals {
        let mut ledger = self.ledger.lock();
        ledger.reset_if_expired(Utc::now(), self.window);
        ledger.totals()
    }
}

/// Owned state of the spawned stream task.
struct StreamWorker {
    symbol: String,
    url: String,
    window: Duration,
    reconnect_delay: Duration,
    ledger: Arc<Mutex<LiquidationLedger>>,
    running: Arc<AtomicBool>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl StreamWorker {
    /// Connect, consume and reconnect until stopped.
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Starting liquidation stream for {}", self.url);

        while self.running.load(Ordering::SeqCst) {
            let _ = self.status_tx.send(ConnectionStatus::Connecting);

            match connect_async(&self.url).await {
                Ok((ws_stream, _)) => {
                    info!("Connected to liquidation stream at {}", self.url);
                    let _ = self.status_tx.send(ConnectionStatus::Connected);

                    self.consume(ws_stream, &mut shutdown_rx).await;

                    let _ = self.status_tx.send(ConnectionStatus::Disconnected);
                }
                Err(error) => {
                    error!("Failed to connect to {}: {}", self.url, error);
                    let _ = self.status_tx.send(ConnectionStatus::Disconnected);
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        let _ = self.status_tx.send(ConnectionStatus::Stopped);
    }

    /// Read frames until the connection drops or shutdown is signalled.
    async fn consume(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.apply_frame(&text),
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Heartbeat messages - tungstenite handles these automatically
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Server closed liquidation stream");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        error!("Liquidation stream error: {}", error);
                        break;
                    }
                    None => {
                        warn!("Liquidation stream ended");
                        break;
                    }
                },
            }
        }
    }

    /// Parse one text frame and fold it into the ledger. Unparseable frames
    /// and foreign symbols are dropped; the stream keeps running.
    fn apply_frame(&self, text: &str) {
        match serde_json::from_str::<ForceOrderEvent>(text) {
            Ok(event) => {
                if self.symbol != "ALL" && event.order.symbol != self.symbol {
                    return;
                }
                let value = event.order.value();
                let mut ledger = self.ledger.lock();
                ledger.reset_if_expired(Utc::now(), self.window);
                ledger.apply(event.order.side, value);
                debug!(
                    "Recorded {} liquidation of {:.2} for {}",
                    event.order.side, value, event.order.symbol
                );
            }
            Err(error) => {
                let error = DataError::MalformedMessage(error.to_string());
                debug!("Dropping liquidation frame: {}", error);
            }
        }
    }
}
