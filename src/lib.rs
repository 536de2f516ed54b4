// Library crate - market data core shared by the CLI

pub mod types;
pub mod api;
pub mod store;
pub mod fetcher;
pub mod feed;
pub mod indicators;
pub mod analysis;
pub mod prefs;
pub mod watchlist;
pub mod view;
pub mod config;
pub mod app;

// Re-export commonly used types
pub use types::*;
pub use app::App;
pub use store::{MarketSnapshot, MarketStore};
