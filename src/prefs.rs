//! Persisted client preferences
//!
//! A flat string key/value file, the terminal counterpart of browser local
//! storage. Every `set` rewrites the whole file before returning.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub const THEME_KEY: &str = "theme";
pub const WATCHLIST_KEY: &str = "watchlist";
pub const VIP_EMAIL_KEY: &str = "vipUserEmail";

struct Inner {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

/// Cheaply cloneable handle; clones share the same backing map and file
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<Mutex<Inner>>,
}

impl PreferenceStore {
    /// Open (or lazily create) the preference file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Ignoring unreadable preferences file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!("Loaded {} preferences from {}", values.len(), path.display());

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: Some(path),
                values,
            })),
        })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                path: None,
                values: BTreeMap::new(),
            })),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut values = inner.values.clone();
        values.insert(key.to_string(), value.into());
        persist(inner.path.as_deref(), &values)?;
        inner.values = values;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.values.contains_key(key) {
            return Ok(());
        }
        let mut values = inner.values.clone();
        values.remove(key);
        persist(inner.path.as_deref(), &values)?;
        inner.values = values;
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.to_string())
    }

    /// Flip between dark and light, returning the new theme
    pub fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn vip_email(&self) -> Option<String> {
        self.get(VIP_EMAIL_KEY)
    }

    /// Remember the premium-area e-mail. Empty input is rejected.
    pub fn set_vip_email(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            bail!("Please enter your email address");
        }
        self.set(VIP_EMAIL_KEY, email)
    }

    pub fn clear_vip_email(&self) -> Result<()> {
        self.remove(VIP_EMAIL_KEY)
    }
}

/// Write to a sibling temp file, then rename over the target
fn persist(path: Option<&Path>, values: &BTreeMap<String, String>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let json = serde_json::to_string_pretty(values)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => bail!("Unknown theme: {}", other),
        }
    }
}
