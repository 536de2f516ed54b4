//! Persisted watchlist of asset identifiers

use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use tracing::{info, warn};

use crate::prefs::{PreferenceStore, WATCHLIST_KEY};

/// Seed used when nothing has been persisted yet
pub const DEFAULT_WATCHLIST: [&str; 3] = ["bitcoin", "ethereum", "solana"];

pub struct Watchlist {
    ids: IndexSet<String>,
    prefs: PreferenceStore,
}

impl Watchlist {
    /// Read the persisted list, or start from [`DEFAULT_WATCHLIST`]
    pub fn load(prefs: PreferenceStore) -> Self {
        let ids = match prefs.get(WATCHLIST_KEY) {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => ids.iter().filter_map(|id| normalize(id).ok()).collect(),
                Err(e) => {
                    warn!("Stored watchlist is unreadable, using defaults: {}", e);
                    default_ids()
                }
            },
            None => default_ids(),
        };

        Self { ids, prefs }
    }

    pub fn contains(&self, id: &str) -> bool {
        normalize(id).is_ok_and(|id| self.ids.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Returns `true` if the id was newly added
    pub fn add(&mut self, id: &str) -> Result<bool> {
        let id = normalize(id)?;
        if self.ids.contains(&id) {
            return Ok(false);
        }

        let mut next = self.ids.clone();
        next.insert(id.clone());
        self.commit(next)?;
        info!("Added {} to watchlist", id);
        Ok(true)
    }

    /// Returns `true` if the id was present
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let id = normalize(id)?;
        if !self.ids.contains(&id) {
            return Ok(false);
        }

        let mut next = self.ids.clone();
        next.shift_remove(&id);
        self.commit(next)?;
        info!("Removed {} from watchlist", id);
        Ok(true)
    }

    /// Add when absent, remove when present. Returns the new membership.
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        if self.contains(&normalize(id)?) {
            self.remove(id).map(|_| false)
        } else {
            self.add(id).map(|_| true)
        }
    }

    /// Persist first so a failed write leaves memory and disk in agreement
    fn commit(&mut self, next: IndexSet<String>) -> Result<()> {
        let ids: Vec<&String> = next.iter().collect();
        let json = serde_json::to_string(&ids)?;
        self.prefs
            .set(WATCHLIST_KEY, json)
            .context("Failed to persist watchlist")?;
        self.ids = next;
        Ok(())
    }
}

fn default_ids() -> IndexSet<String> {
    DEFAULT_WATCHLIST.iter().map(|id| id.to_string()).collect()
}

fn normalize(id: &str) -> Result<String> {
    let id = id.trim().to_lowercase();
    if id.is_empty() {
        bail!("Watchlist entry must not be empty");
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed() {
        let watchlist = Watchlist::load(PreferenceStore::in_memory());
        assert_eq!(watchlist.len(), 3);
        assert!(watchlist.contains("bitcoin"));
        assert!(watchlist.contains("ethereum"));
        assert!(watchlist.contains("solana"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut watchlist = Watchlist::load(PreferenceStore::in_memory());
        assert!(watchlist.add("cardano").unwrap());
        let size = watchlist.len();

        assert!(!watchlist.add("cardano").unwrap());
        assert!(!watchlist.add("  CARDANO ").unwrap());
        assert_eq!(watchlist.len(), size);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut watchlist = Watchlist::load(PreferenceStore::in_memory());
        assert!(!watchlist.remove("dogecoin").unwrap());
        assert_eq!(watchlist.len(), 3);

        assert!(watchlist.remove("ethereum").unwrap());
        assert!(!watchlist.contains("ethereum"));
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let mut watchlist = Watchlist::load(PreferenceStore::in_memory());

        assert!(watchlist.toggle("x").unwrap());
        assert!(watchlist.contains("x"));
        assert!(!watchlist.toggle("x").unwrap());
        assert!(!watchlist.contains("x"));

        assert!(!watchlist.toggle("bitcoin").unwrap());
        assert!(watchlist.toggle("bitcoin").unwrap());
        assert!(watchlist.contains("bitcoin"));
    }

    #[test]
    fn test_empty_entry_rejected_without_change() {
        let prefs = PreferenceStore::in_memory();
        let mut watchlist = Watchlist::load(prefs.clone());

        assert!(watchlist.add("   ").is_err());
        assert!(watchlist.toggle("").is_err());
        assert_eq!(watchlist.len(), 3);
        assert!(prefs.get(WATCHLIST_KEY).is_none());
    }

    #[test]
    fn test_mutations_persist_in_order() {
        let prefs = PreferenceStore::in_memory();
        let mut watchlist = Watchlist::load(prefs.clone());
        watchlist.remove("ethereum").unwrap();
        watchlist.add("ripple").unwrap();

        assert_eq!(
            prefs.get(WATCHLIST_KEY).as_deref(),
            Some(r#"["bitcoin","solana","ripple"]"#)
        );

        let reloaded = Watchlist::load(prefs);
        let ids: Vec<&str> = reloaded.iter().collect();
        assert_eq!(ids, vec!["bitcoin", "solana", "ripple"]);
    }

    #[test]
    fn test_persisted_empty_list_is_not_reseeded() {
        let prefs = PreferenceStore::in_memory();
        prefs.set(WATCHLIST_KEY, "[]").unwrap();

        let watchlist = Watchlist::load(prefs);
        assert!(watchlist.is_empty());
    }

    #[test]
    fn test_unreadable_list_falls_back_to_seed() {
        let prefs = PreferenceStore::in_memory();
        prefs.set(WATCHLIST_KEY, "bitcoin,ethereum").unwrap();

        let watchlist = Watchlist::load(prefs);
        assert_eq!(watchlist.len(), 3);
    }

    #[test]
    fn test_lookup_matches_add_normalization() {
        let watchlist = Watchlist::load(PreferenceStore::in_memory());
        assert!(watchlist.contains("Bitcoin"));
        assert!(watchlist.contains("  SOLANA "));
        assert!(!watchlist.contains("   "));
    }

    #[test]
    fn test_stored_ids_are_normalized_on_load() {
        let prefs = PreferenceStore::in_memory();
        prefs
            .set(WATCHLIST_KEY, r#"["Bitcoin", "bitcoin", " Ripple ", ""]"#)
            .unwrap();

        let mut watchlist = Watchlist::load(prefs);
        let ids: Vec<&str> = watchlist.iter().collect();
        assert_eq!(ids, vec!["bitcoin", "ripple"]);

        assert!(watchlist.remove("Bitcoin").unwrap());
        assert!(!watchlist.contains("bitcoin"));
    }
}
