//! Live price feed with auto-reconnect
//!
//! A single supervised task owns the connection and its backoff state.
//! Full `price_update` snapshots replace the store's markets slice; the REST
//! poller remains the authoritative source, so anything odd on this channel
//! is logged and dropped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{MarketStore, UpdateSource};
use crate::types::MarketRecord;

pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);
pub const RECONNECT_MULTIPLIER: f64 = 1.5;

const PRICE_UPDATE: &str = "price_update";

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
}

/// Exponential reconnect delay: 5s, x1.5 per scheduled retry, capped at 30s
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_RECONNECT_DELAY, MAX_RECONNECT_DELAY, RECONNECT_MULTIPLIER)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt; grows the one after it
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }

    /// Called on a successful connect
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn peek(&self) -> Duration {
        self.current
    }
}

/// Text frames of one open connection. The stream ends when the peer
/// closes; an `Err` item means the transport failed.
pub type FrameStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameStream>;
}

/// Real connector backed by tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        let frames = ws_stream
            .take_while(|msg| futures::future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                futures::future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(anyhow::Error::new(e))),
                })
            });

        Ok(frames.boxed())
    }
}

/// Build a frame stream from canned messages, for tests and replays
pub fn frames_from(messages: Vec<Result<String>>) -> FrameStream {
    stream::iter(messages).boxed()
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one feed message. `None` for anything that is not a well-formed
/// full price update.
pub fn parse_price_update(text: &str) -> Option<Vec<MarketRecord>> {
    let envelope: FeedEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Dropping malformed feed message: {}", e);
            return None;
        }
    };

    if envelope.kind != PRICE_UPDATE {
        debug!("Ignoring feed message of type {:?}", envelope.kind);
        return None;
    }

    let data = envelope.data.filter(|d| !d.is_null())?;
    match serde_json::from_value(data) {
        Ok(records) => Some(records),
        Err(e) => {
            warn!("Dropping price update with unexpected payload: {}", e);
            None
        }
    }
}

pub struct LiveFeed<C> {
    url: String,
    connector: C,
    store: Arc<MarketStore>,
    backoff: Backoff,
    state_tx: watch::Sender<FeedState>,
}

impl<C: FeedConnector> LiveFeed<C> {
    pub fn new(url: impl Into<String>, connector: C, store: Arc<MarketStore>) -> Self {
        let (state_tx, _) = watch::channel(FeedState::Disconnected);
        Self {
            url: url.into(),
            connector,
            store,
            backoff: Backoff::default(),
            state_tx,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: FeedState) {
        self.state_tx.send_replace(state);
    }

    async fn handle_text(&self, text: &str) {
        if let Some(records) = parse_price_update(text) {
            debug!("Price update with {} records", records.len());
            self.store.replace_markets(records, UpdateSource::Feed).await;
        }
    }

    /// Run until `shutdown` fires. Cancellation drops the open connection
    /// and any pending reconnect sleep in one step.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            self.set_state(FeedState::Connecting);
            info!("Connecting to price feed at {}", self.url);

            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };

            match connected {
                Ok(mut frames) => {
                    info!("Price feed connected");
                    self.backoff.reset();
                    self.set_state(FeedState::Connected);

                    loop {
                        let frame = tokio::select! {
                            _ = shutdown.cancelled() => {
                                self.set_state(FeedState::Disconnected);
                                info!("Price feed stopped");
                                return;
                            }
                            frame = frames.next() => frame,
                        };

                        match frame {
                            Some(Ok(text)) => self.handle_text(&text).await,
                            Some(Err(e)) => {
                                warn!("Price feed error: {:#}", e);
                                break;
                            }
                            None => {
                                info!("Price feed closed by server");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("Price feed connect failed: {:#}", e),
            }

            self.set_state(FeedState::Disconnected);
            let delay = self.backoff.next_delay();
            info!("Reconnecting to price feed in {}ms", delay.as_millis());

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(FeedState::Disconnected);
        info!("Price feed stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Hands out scripted connection outcomes; once exhausted every attempt
    /// fails. Records when each attempt happened.
    #[derive(Default)]
    struct ScriptedConnector {
        script: Mutex<VecDeque<Result<Vec<Result<String>>>>>,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedConnector {
        fn new(script: Vec<Result<Vec<Result<String>>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                attempts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl FeedConnector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<FrameStream> {
            self.attempts.lock().push(Instant::now());
            match self.script.lock().pop_front() {
                Some(Ok(messages)) => Ok(frames_from(messages)),
                Some(Err(e)) => Err(e),
                None => Err(anyhow!("connection refused")),
            }
        }
    }

    fn gaps(attempts: &[Instant]) -> Vec<u128> {
        attempts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }

    fn assert_close(actual: u128, expected: u128) {
        assert!(
            actual >= expected && actual <= expected + 2,
            "expected ~{}ms, got {}ms",
            expected,
            actual
        );
    }

    #[test]
    fn test_backoff_sequence_and_cap() {
        let mut backoff = Backoff::default();
        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(5_000));
        assert_eq!(delays[1], Duration::from_millis(7_500));
        assert_eq!(delays[2], Duration::from_millis(11_250));
        assert_eq!(delays[3], Duration::from_millis(16_875));
        assert_eq!(delays[4], Duration::from_micros(25_312_500));
        assert_eq!(delays[5], MAX_RECONNECT_DELAY);
        assert_eq!(delays[6], MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.peek(), Duration::from_millis(11_250));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_parse_price_update() {
        let text = r#"{"type": "price_update", "data": [{"id": "bitcoin", "current_price": 64000}]}"#;
        let records = parse_price_update(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].current_price, 64000.0);

        // An empty snapshot is still a snapshot
        assert_eq!(parse_price_update(r#"{"type": "price_update", "data": []}"#), Some(vec![]));
    }

    #[test]
    fn test_parse_rejects_other_messages() {
        assert!(parse_price_update("not json").is_none());
        assert!(parse_price_update(r#"{"type": "heartbeat", "data": []}"#).is_none());
        assert!(parse_price_update(r#"{"type": "price_update"}"#).is_none());
        assert!(parse_price_update(r#"{"type": "price_update", "data": null}"#).is_none());
        assert!(parse_price_update(r#"{"type": "price_update", "data": {"id": 1}}"#).is_none());
        assert!(parse_price_update(r#"{"data": []}"#).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connects_back_off() {
        let connector = ScriptedConnector::new(vec![]);
        let attempts = connector.attempts.clone();

        let store = Arc::new(MarketStore::new());
        let feed = LiveFeed::new("ws://test/ws/prices", connector, store);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(feed.run(shutdown.clone()));

        // 5 + 7.5 + 11.25 + 16.875 seconds of retries, plus slack
        tokio::time::sleep(Duration::from_millis(41_000)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let attempts = attempts.lock().clone();
        assert_eq!(attempts.len(), 5);
        let gaps = gaps(&attempts);
        assert_close(gaps[0], 5_000);
        assert_close(gaps[1], 7_500);
        assert_close(gaps[2], 11_250);
        assert_close(gaps[3], 16_875);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_connect_resets_backoff() {
        let connector = ScriptedConnector::new(vec![
            Err(anyhow!("refused")),
            Err(anyhow!("refused")),
            Ok(vec![]),
        ]);
        let attempts = connector.attempts.clone();

        let store = Arc::new(MarketStore::new());
        let feed = LiveFeed::new("ws://test/ws/prices", connector, store);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(feed.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        shutdown.cancel();
        handle.await.unwrap();

        // refused, +5s refused, +7.5s connected then closed, +5s again
        let attempts = attempts.lock().clone();
        assert_eq!(attempts.len(), 4);
        let gaps = gaps(&attempts);
        assert_close(gaps[0], 5_000);
        assert_close(gaps[1], 7_500);
        assert_close(gaps[2], 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_updates_replace_markets() {
        let connector = ScriptedConnector::new(vec![Ok(vec![
            Ok("garbage".to_string()),
            Ok(r#"{"type": "price_update", "data": [{"id": "bitcoin"}, {"id": "ethereum"}]}"#.to_string()),
            Ok(r#"{"type": "status", "data": []}"#.to_string()),
            Ok(r#"{"type": "price_update", "data": [{"id": "solana", "current_price": 150}]}"#.to_string()),
            Err(anyhow!("reset by peer")),
            Ok(r#"{"type": "price_update", "data": []}"#.to_string()),
        ])]);

        let store = Arc::new(MarketStore::new());
        let mut events = store.subscribe();
        let feed = LiveFeed::new("ws://test/ws/prices", connector, store.clone());
        let mut state = feed.state();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(feed.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Two accepted updates; nothing after the transport error
        let markets = store.markets().await;
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].id, "solana");
        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
        assert_eq!(*state.borrow_and_update(), FeedState::Disconnected);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), FeedState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_connected() {
        struct PendingConnector;

        #[async_trait]
        impl FeedConnector for PendingConnector {
            async fn connect(&self, _url: &str) -> Result<FrameStream> {
                Ok(stream::pending::<Result<String>>().boxed())
            }
        }

        let store = Arc::new(MarketStore::new());
        let feed = LiveFeed::new("ws://test/ws/prices", PendingConnector, store);
        let state = feed.state();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(feed.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*state.borrow(), FeedState::Connected);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), FeedState::Disconnected);
    }
}
