//! Application root
//!
//! Owns the market store and the two background tasks that feed it. Built
//! once at startup; `shutdown()` stops the poll timer and the price feed
//! together and waits for both to finish.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::MarketDataSource;
use crate::feed::{FeedConnector, FeedState, LiveFeed};
use crate::fetcher::DataFetcher;
use crate::store::MarketStore;

pub struct App {
    store: Arc<MarketStore>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    feed_state: Option<watch::Receiver<FeedState>>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MarketStore::new()),
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
            feed_state: None,
        }
    }

    pub fn store(&self) -> Arc<MarketStore> {
        self.store.clone()
    }

    /// Token cancelled by [`App::shutdown`]; hand it to anything that
    /// should stop with the app
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn feed_state(&self) -> Option<watch::Receiver<FeedState>> {
        self.feed_state.clone()
    }

    /// Start polling the REST snapshots
    pub fn start_polling(&mut self, source: Arc<dyn MarketDataSource>, every: Duration) {
        let fetcher = DataFetcher::new(source, self.store.clone());
        let token = self.shutdown.child_token();
        self.tasks.push(tokio::spawn(fetcher.run(every, token)));
    }

    /// Start the reconnecting price feed
    pub fn start_feed<C>(&mut self, url: impl Into<String>, connector: C)
    where
        C: FeedConnector + 'static,
    {
        let feed = LiveFeed::new(url, connector, self.store.clone());
        self.feed_state = Some(feed.state());
        let token = self.shutdown.child_token();
        self.tasks.push(tokio::spawn(feed.run(token)));
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down");
        self.shutdown.cancel();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{frames_from, FrameStream};
    use crate::fetcher::tests::FakeSource;
    use crate::store::tests::record;
    use crate::store::{StoreEvent, UpdateSource};
    use async_trait::async_trait;

    struct OneShotFeed;

    #[async_trait]
    impl FeedConnector for OneShotFeed {
        async fn connect(&self, _url: &str) -> Result<FrameStream> {
            Ok(frames_from(vec![Ok(
                r#"{"type": "price_update", "data": [{"id": "dogecoin"}]}"#.to_string(),
            )]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_and_feed_share_store() {
        let source = Arc::new(FakeSource::default());
        *source.markets.lock() = Some(vec![record("bitcoin", 1.0, 0.0)]);

        let mut app = App::new();
        let store = app.store();
        let mut events = store.subscribe();

        app.start_polling(source.clone(), Duration::from_secs(60));
        app.start_feed("ws://test/ws/prices", OneShotFeed);
        assert!(app.feed_state().is_some());

        let mut sources = Vec::new();
        while sources.len() < 2 {
            if let StoreEvent::Markets { source, .. } = events.recv().await.unwrap() {
                sources.push(source);
            }
        }
        assert!(sources.contains(&UpdateSource::Poll));
        assert!(sources.contains(&UpdateSource::Feed));

        app.shutdown().await.unwrap();

        // Nothing polls after shutdown
        let calls = *source.calls.lock();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(*source.calls.lock(), calls);
    }
}
