//! Client configuration

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::{self, DEFAULT_BASE_URL};
use crate::fetcher::DEFAULT_REFRESH_INTERVAL;

pub const DEFAULT_PREFS_PATH: &str = ".krypticks/prefs.json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base, e.g. `http://localhost:8000`
    pub api_base: String,
    /// Explicit feed URL; derived from `api_base` when unset
    pub ws_url: Option<String>,
    pub prefs_path: PathBuf,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            prefs_path: PathBuf::from(DEFAULT_PREFS_PATH),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Feed URL to connect to
    pub fn feed_url(&self) -> Result<String> {
        match &self.ws_url {
            Some(url) => Ok(url.clone()),
            None => api::ws_url_from_base(&self.api_base),
        }
    }
}
