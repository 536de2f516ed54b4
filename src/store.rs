//! Market snapshot store
//!
//! Holds the latest markets array and the two aggregate slices. Every
//! mutator swaps a whole slice; nothing is edited in place, so a reader
//! holding a snapshot never sees a half-applied update.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::types::{FearGreedIndex, GlobalMetrics, MarketRecord};

/// Who delivered a markets snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Poll,
    Feed,
}

/// Change notification, one per replaced slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Markets { source: UpdateSource, count: usize },
    Global,
    FearGreed,
}

/// All three slices read together
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub markets: Arc<Vec<MarketRecord>>,
    pub global: Option<GlobalMetrics>,
    pub fear_greed: Option<FearGreedIndex>,
}

pub struct MarketStore {
    markets: RwLock<Arc<Vec<MarketRecord>>>,
    global: RwLock<Option<GlobalMetrics>>,
    fear_greed: RwLock<Option<FearGreedIndex>>,
    tx: broadcast::Sender<StoreEvent>,
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            markets: RwLock::new(Arc::new(Vec::new())),
            global: RwLock::new(None),
            fear_greed: RwLock::new(None),
            tx,
        }
    }

    /// Receive a [`StoreEvent`] for every slice replacement from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub async fn replace_markets(&self, records: Vec<MarketRecord>, source: UpdateSource) {
        let count = records.len();
        *self.markets.write().await = Arc::new(records);
        debug!("Markets replaced ({} records, {:?})", count, source);
        // No subscribers is fine
        let _ = self.tx.send(StoreEvent::Markets { source, count });
    }

    pub async fn replace_global(&self, metrics: GlobalMetrics) {
        *self.global.write().await = Some(metrics);
        let _ = self.tx.send(StoreEvent::Global);
    }

    pub async fn replace_fear_greed(&self, index: FearGreedIndex) {
        *self.fear_greed.write().await = Some(index);
        let _ = self.tx.send(StoreEvent::FearGreed);
    }

    /// Current markets list. The returned handle is immutable; later swaps
    /// install a new list rather than touching this one.
    pub async fn markets(&self) -> Arc<Vec<MarketRecord>> {
        self.markets.read().await.clone()
    }

    pub async fn global(&self) -> Option<GlobalMetrics> {
        self.global.read().await.clone()
    }

    pub async fn fear_greed(&self) -> Option<FearGreedIndex> {
        self.fear_greed.read().await.clone()
    }

    pub async fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            markets: self.markets().await,
            global: self.global().await,
            fear_greed: self.fear_greed().await,
        }
    }

    pub async fn find(&self, id: &str) -> Option<MarketRecord> {
        self.markets
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }
}
