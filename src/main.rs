use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use krypticks::analysis::CoinAnalysis;
use krypticks::api::{ApiClient, MarketDataSource};
use krypticks::app::App;
use krypticks::config::ClientConfig;
use krypticks::feed::WsConnector;
use krypticks::fetcher::DataFetcher;
use krypticks::prefs::{PreferenceStore, Theme};
use krypticks::store::MarketStore;
use krypticks::view::{self, DashboardView};
use krypticks::watchlist::Watchlist;

#[derive(Parser, Debug)]
#[command(name = "krypticks", author, version, about = "Krypticks crypto market dashboard in the terminal")]
struct Args {
    /// Base URL of the Krypticks API
    #[arg(long, env = "KRYPTICKS_API_BASE", default_value = krypticks::api::DEFAULT_BASE_URL, global = true)]
    api_base: String,

    /// Price feed URL (derived from the API base when omitted)
    #[arg(long, env = "KRYPTICKS_WS_URL", global = true)]
    ws_url: Option<String>,

    /// Preferences file (watchlist, theme, VIP e-mail)
    #[arg(long, env = "KRYPTICKS_PREFS", default_value = krypticks::config::DEFAULT_PREFS_PATH, global = true)]
    prefs: PathBuf,

    /// Seconds between REST snapshot refreshes
    #[arg(long, default_value = "60", global = true)]
    refresh_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "10", global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live dashboard: poll snapshots and follow the price feed
    Watch {
        /// Rows in the market table
        #[arg(short, long, default_value = "20")]
        top: usize,
    },
    /// Fetch once, print the dashboard and exit
    Snapshot {
        #[arg(short, long, default_value = "20")]
        top: usize,
    },
    /// Technical analysis for one coin id (e.g. bitcoin)
    Analyze { id: String },
    /// Premium AI signals
    Signals,
    /// Backend health check
    Health,
    /// Manage the watchlist
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
    /// Show or change the colour theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
    /// Remember or forget the VIP e-mail
    Vip {
        #[command(subcommand)]
        action: VipAction,
    },
}

#[derive(Subcommand, Debug)]
enum WatchlistAction {
    List,
    Add { id: String },
    Remove { id: String },
    Toggle { id: String },
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    Show,
    Toggle,
    Set { theme: Theme },
}

#[derive(Subcommand, Debug)]
enum VipAction {
    Login { email: String },
    Logout,
    Status,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base: self.api_base.clone(),
            ws_url: self.ws_url.clone(),
            prefs_path: self.prefs.clone(),
            refresh_interval: Duration::from_secs(self.refresh_secs.max(1)),
            request_timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so the dashboard owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("krypticks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.client_config();
    let prefs = PreferenceStore::open(&config.prefs_path)?;

    match args.command {
        Commands::Watch { top } => run_watch(&config, prefs, top).await,
        Commands::Snapshot { top } => run_snapshot(&config, prefs, top).await,
        Commands::Analyze { id } => run_analyze(&config, &id).await,
        Commands::Signals => {
            let client = ApiClient::new(&config.api_base, config.request_timeout)?;
            if prefs.vip_email().is_none() {
                info!("No VIP e-mail saved; use `krypticks vip login <email>`");
            }
            let response = client.vip_signals().await?;
            print!("{}", view::render_vip_signals(&response));
            Ok(())
        }
        Commands::Health => {
            let client = ApiClient::new(&config.api_base, config.request_timeout)?;
            let health = client.health().await?;
            println!("{} ({})", health.status, health.service);
            Ok(())
        }
        Commands::Watchlist { action } => run_watchlist(prefs, action),
        Commands::Theme { action } => {
            let theme = match action {
                ThemeAction::Show => prefs.theme(),
                ThemeAction::Toggle => prefs.toggle_theme()?,
                ThemeAction::Set { theme } => {
                    prefs.set_theme(theme)?;
                    theme
                }
            };
            println!("{}", theme);
            Ok(())
        }
        Commands::Vip { action } => {
            match action {
                VipAction::Login { email } => {
                    prefs.set_vip_email(&email)?;
                    println!("Logged in as {}", email.trim());
                }
                VipAction::Logout => {
                    prefs.clear_vip_email()?;
                    println!("Logged out");
                }
                VipAction::Status => match prefs.vip_email() {
                    Some(email) => println!("Logged in as {}", email),
                    None => println!("Not logged in"),
                },
            }
            Ok(())
        }
    }
}

async fn run_watch(config: &ClientConfig, prefs: PreferenceStore, top: usize) -> Result<()> {
    let client: Arc<dyn MarketDataSource> =
        Arc::new(ApiClient::new(&config.api_base, config.request_timeout)?);
    let feed_url = config.feed_url()?;
    let watchlist = Watchlist::load(prefs.clone());

    info!("Starting Krypticks dashboard");
    info!("API: {}", config.api_base);
    info!("Feed: {}", feed_url);

    let mut app = App::new();
    let store = app.store();
    let mut events = store.subscribe();

    app.start_polling(client, config.refresh_interval);
    app.start_feed(feed_url, WsConnector);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C");
                break;
            }
            event = events.recv() => match event {
                Ok(_) => {
                    let snapshot = store.snapshot().await;
                    let dashboard = DashboardView::build(&snapshot, &watchlist, prefs.theme(), top);
                    // Clear screen, cursor home
                    print!("\x1b[2J\x1b[H{}", view::render_dashboard(&dashboard));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Renderer skipped {} store events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    app.shutdown().await
}

async fn run_snapshot(config: &ClientConfig, prefs: PreferenceStore, top: usize) -> Result<()> {
    let client = Arc::new(ApiClient::new(&config.api_base, config.request_timeout)?);
    let store = Arc::new(MarketStore::new());
    let report = DataFetcher::new(client, store.clone()).refresh_all().await;
    if !report.all_ok() {
        warn!("Some data could not be fetched: {:?}", report);
    }

    let watchlist = Watchlist::load(prefs.clone());
    let dashboard = DashboardView::build(&store.snapshot().await, &watchlist, prefs.theme(), top);
    print!("{}", view::render_dashboard(&dashboard));
    Ok(())
}

async fn run_analyze(config: &ClientConfig, id: &str) -> Result<()> {
    let client = ApiClient::new(&config.api_base, config.request_timeout)?;
    let id = id.trim().to_lowercase();
    let markets = client.markets().await.context("Could not load market data")?;
    let record = markets
        .iter()
        .find(|record| record.id == id)
        .ok_or_else(|| anyhow!("{} is not among the tracked markets", id))?;

    print!("{}", view::render_analysis(&CoinAnalysis::from_record(record)));
    Ok(())
}

fn run_watchlist(prefs: PreferenceStore, action: WatchlistAction) -> Result<()> {
    let mut watchlist = Watchlist::load(prefs);

    match action {
        WatchlistAction::List => {}
        WatchlistAction::Add { id } => {
            if !watchlist.add(&id)? {
                println!("{} is already on the watchlist", id.trim());
            }
        }
        WatchlistAction::Remove { id } => {
            if !watchlist.remove(&id)? {
                println!("{} was not on the watchlist", id.trim());
            }
        }
        WatchlistAction::Toggle { id } => {
            let watched = watchlist.toggle(&id)?;
            println!("{} {}", id.trim(), if watched { "added" } else { "removed" });
        }
    }

    if watchlist.is_empty() {
        println!("No coins in watchlist");
    }
    for id in watchlist.iter() {
        println!("{}", id);
    }
    Ok(())
}
