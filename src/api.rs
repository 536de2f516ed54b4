//! Krypticks REST API client
//!
//! Thin typed wrapper over the dashboard backend. Every call returns
//! `anyhow::Result`; callers at the fetch boundary decide how to degrade.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::types::{FearGreedIndex, GlobalMetrics, HealthStatus, MarketRecord, VipSignalsResponse};

/// Default backend when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Path of the streaming price endpoint
pub const WS_PRICES_PATH: &str = "/ws/prices";

/// The three snapshot endpoints the fetcher polls
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn markets(&self) -> Result<Vec<MarketRecord>>;
    async fn global(&self) -> Result<GlobalMetrics>;
    async fn fear_greed(&self) -> Result<FearGreedIndex>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<R> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} returned status {}: {}", endpoint, status, body));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", endpoint))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("/api/health", &[]).await
    }

    /// Premium signals. The timestamp query defeats intermediary caches.
    pub async fn vip_signals(&self) -> Result<VipSignalsResponse> {
        let cache_bust = chrono::Utc::now().timestamp_millis().to_string();
        self.get("/api/vip/signals", &[("t", cache_bust)]).await
    }
}

#[async_trait]
impl MarketDataSource for ApiClient {
    async fn markets(&self) -> Result<Vec<MarketRecord>> {
        self.get("/api/markets", &[]).await
    }

    async fn global(&self) -> Result<GlobalMetrics> {
        self.get("/api/global", &[]).await
    }

    async fn fear_greed(&self) -> Result<FearGreedIndex> {
        self.get("/api/fear-greed", &[]).await
    }
}

/// Derive the price-feed URL from the REST base: `http` becomes `ws`,
/// `https` becomes `wss`.
pub fn ws_url_from_base(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| anyhow!("API base URL has no scheme: {}", base_url))?;

    let ws_scheme = match scheme {
        "https" => "wss",
        "http" => "ws",
        other => return Err(anyhow!("Unsupported API base scheme: {}", other)),
    };

    Ok(format!("{}://{}{}", ws_scheme, rest, WS_PRICES_PATH))
}
