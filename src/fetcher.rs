//! Periodic REST snapshot fetcher
//!
//! Each slice is fetched independently. A failing slice keeps whatever the
//! store already holds; the next tick is the only retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::MarketDataSource;
use crate::store::{MarketStore, UpdateSource};

/// Default polling period
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Which slices the last refresh managed to replace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub markets: bool,
    pub global: bool,
    pub fear_greed: bool,
}

impl RefreshReport {
    pub fn all_ok(&self) -> bool {
        self.markets && self.global && self.fear_greed
    }
}

pub struct DataFetcher {
    source: Arc<dyn MarketDataSource>,
    store: Arc<MarketStore>,
}

impl DataFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, store: Arc<MarketStore>) -> Self {
        Self { source, store }
    }

    /// Fetch markets, global metrics and fear/greed concurrently
    pub async fn refresh_all(&self) -> RefreshReport {
        let (markets, global, fear_greed) = tokio::join!(
            self.source.markets(),
            self.source.global(),
            self.source.fear_greed()
        );

        let mut report = RefreshReport::default();

        match markets {
            Ok(records) => {
                self.store.replace_markets(records, UpdateSource::Poll).await;
                report.markets = true;
            }
            Err(e) => warn!("Markets fetch failed, keeping previous data: {:#}", e),
        }

        match global {
            Ok(metrics) => {
                self.store.replace_global(metrics).await;
                report.global = true;
            }
            Err(e) => warn!("Global metrics fetch failed, keeping previous data: {:#}", e),
        }

        match fear_greed {
            Ok(index) => {
                self.store.replace_fear_greed(index).await;
                report.fear_greed = true;
            }
            Err(e) => warn!("Fear & greed fetch failed, keeping previous data: {:#}", e),
        }

        report
    }

    /// Refresh immediately, then on every tick until cancelled
    pub async fn run(self, every: Duration, shutdown: CancellationToken) {
        info!("Polling market snapshots every {}s", every.as_secs());

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // An in-flight refresh is abandoned on shutdown
                    let report = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        report = self.refresh_all() => report,
                    };
                    if !report.all_ok() {
                        warn!("Partial refresh: {:?}", report);
                    }
                }
            }
        }

        info!("Snapshot polling stopped");
    }
}
