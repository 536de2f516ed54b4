//! Text dashboard
//!
//! `DashboardView` is the boundary between the data core and whatever paints
//! it: a plain model built from one store snapshot plus the watchlist. The
//! `render_*` functions turn models into terminal text.

use std::fmt::Write;

use crate::analysis::CoinAnalysis;
use crate::indicators;
use crate::prefs::Theme;
use crate::store::MarketSnapshot;
use crate::types::{FearGreedIndex, MarketRecord, Signal, VipSignal, VipSignalsResponse};
use crate::watchlist::Watchlist;

/// Number of signal cards on the dashboard
pub const SIGNAL_CARDS: usize = 3;

const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSection {
    pub total_market_cap: f64,
    pub market_cap_change_24h: f64,
    pub total_volume: Option<f64>,
    pub btc_dominance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinRow {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub watched: bool,
    pub sparkline: String,
}

impl CoinRow {
    fn from_record(record: &MarketRecord, watched: bool) -> Self {
        Self {
            id: record.id.clone(),
            symbol: record.symbol.to_uppercase(),
            name: record.name.clone(),
            price: record.current_price,
            change_24h: record.price_change_percentage_24h,
            volume: record.total_volume,
            market_cap: record.market_cap,
            watched,
            sparkline: sparkline(record.prices(), SPARK_WIDTH),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalCard {
    pub id: String,
    pub pair: String,
    pub signal: Signal,
    pub change_24h: f64,
    pub reasons: [&'static str; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub theme: Theme,
    pub global: Option<GlobalSection>,
    pub fear_greed: Option<FearGreedIndex>,
    pub coins: Vec<CoinRow>,
    pub watchlist: Vec<CoinRow>,
    pub signals: Vec<SignalCard>,
}

impl DashboardView {
    pub fn build(snapshot: &MarketSnapshot, watchlist: &Watchlist, theme: Theme, top_n: usize) -> Self {
        let global = snapshot
            .global
            .as_ref()
            .filter(|g| g.has_data())
            .map(|g| GlobalSection {
                total_market_cap: g.total_market_cap,
                market_cap_change_24h: g.market_cap_change_24h,
                total_volume: Some(g.total_volume).filter(|v| *v > 0.0),
                btc_dominance: Some(g.btc_dominance).filter(|v| *v > 0.0),
            });

        let coins = snapshot
            .markets
            .iter()
            .take(top_n)
            .map(|record| CoinRow::from_record(record, watchlist.contains(&record.id)))
            .collect();

        let watched = snapshot
            .markets
            .iter()
            .filter(|record| watchlist.contains(&record.id))
            .map(|record| CoinRow::from_record(record, true))
            .collect();

        let signals = snapshot
            .markets
            .iter()
            .take(SIGNAL_CARDS)
            .map(|record| {
                let signal = indicators::classify(record.price_change_percentage_24h);
                SignalCard {
                    id: record.id.clone(),
                    pair: record.pair(),
                    signal,
                    change_24h: record.price_change_percentage_24h,
                    reasons: indicators::signal_reasons(signal),
                }
            })
            .collect();

        Self {
            theme,
            global,
            fear_greed: snapshot.fear_greed.clone(),
            coins,
            watchlist: watched,
            signals,
        }
    }
}

// ============================================================================
// Number formatting
// ============================================================================

/// Insert thousands separators into an already formatted decimal
fn group_thousands(formatted: &str) -> String {
    let (sign, digits) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Two decimals above 1, up to six (at least two) below
pub fn format_number(num: f64) -> String {
    if num.abs() >= 1.0 {
        return group_thousands(&format!("{:.2}", num));
    }

    let mut formatted = format!("{:.6}", num);
    while formatted.ends_with('0') && formatted.split_once('.').map_or(0, |(_, f)| f.len()) > 2 {
        formatted.pop();
    }
    formatted
}

pub fn format_currency(num: f64, compact: bool) -> String {
    if compact {
        let scaled = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")]
            .into_iter()
            .find(|(unit, _)| num >= *unit);
        if let Some((unit, suffix)) = scaled {
            return format!("${:.2}{}", num / unit, suffix);
        }
    }
    format!("${}", group_thousands(&format!("{:.2}", num)))
}

pub fn format_percent(num: f64) -> String {
    format!("{:.2}%", num)
}

fn format_change(change: f64) -> String {
    let arrow = if change >= 0.0 { '↑' } else { '↓' };
    format!("{} {}", arrow, format_percent(change.abs()))
}

/// Unicode block sparkline, resampled to at most `width` glyphs
pub fn sparkline(prices: &[f64], width: usize) -> String {
    if prices.is_empty() || width == 0 {
        return String::new();
    }

    let max = prices.iter().cloned().fold(f64::MIN, f64::max);
    let min = prices.iter().cloned().fold(f64::MAX, f64::min);
    let range = if max - min == 0.0 { 1.0 } else { max - min };

    let samples = width.min(prices.len());
    (0..samples)
        .map(|i| {
            let idx = if samples == 1 {
                prices.len() - 1
            } else {
                i * (prices.len() - 1) / (samples - 1)
            };
            let level = ((prices[idx] - min) / range * (SPARK_BLOCKS.len() - 1) as f64).round() as usize;
            SPARK_BLOCKS[level.min(SPARK_BLOCKS.len() - 1)]
        })
        .collect()
}

// ============================================================================
// Rendering
// ============================================================================

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let rule = "─".repeat(78);

    let _ = writeln!(out, "KRYPTICKS  [{} theme]", view.theme);
    let _ = writeln!(out, "{}", rule);

    if let Some(global) = &view.global {
        let _ = write!(
            out,
            "Market cap {} ({})",
            format_currency(global.total_market_cap, true),
            format_percent(global.market_cap_change_24h)
        );
        if let Some(volume) = global.total_volume {
            let _ = write!(out, " | 24h volume {}", format_currency(volume, true));
        }
        if let Some(dominance) = global.btc_dominance {
            let _ = write!(out, " | BTC dominance {}", format_percent(dominance));
        }
        out.push('\n');
    }

    if let Some(fg) = &view.fear_greed {
        let label = if fg.classification.is_empty() { "Neutral" } else { fg.classification.as_str() };
        let _ = writeln!(out, "Fear & Greed {} ({})", fg.value, label);
    }

    if view.coins.is_empty() {
        let _ = writeln!(out, "\nNo market data yet");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<2} {:<8} {:>14} {:>10} {:>11} {:>11}  {}",
        "", "COIN", "PRICE", "24H", "VOLUME", "MCAP", "7D"
    );
    for row in &view.coins {
        let _ = writeln!(
            out,
            "{:<2} {:<8} {:>14} {:>10} {:>11} {:>11}  {}",
            if row.watched { "*" } else { "" },
            row.symbol,
            format!("${}", format_number(row.price)),
            format_change(row.change_24h),
            format_currency(row.volume, true),
            format_currency(row.market_cap, true),
            row.sparkline
        );
    }

    let _ = writeln!(out, "\nWATCHLIST");
    if view.watchlist.is_empty() {
        let _ = writeln!(out, "  No coins in watchlist");
    }
    for row in &view.watchlist {
        let _ = writeln!(
            out,
            "  {:<8} {:>14} {:>10}",
            row.symbol,
            format!("${}", format_number(row.price)),
            format_change(row.change_24h)
        );
    }

    let _ = writeln!(out, "\nSIGNALS");
    for card in &view.signals {
        let _ = writeln!(out, "  {:<10} {:<12} {}", card.pair, card.signal.to_string(), format_change(card.change_24h));
        for reason in card.reasons {
            let _ = writeln!(out, "    • {}", reason);
        }
    }

    out
}

pub fn render_analysis(analysis: &CoinAnalysis) -> String {
    let mut out = String::new();
    let levels = &analysis.levels;

    let _ = writeln!(out, "{} ({})  #{}", analysis.name, analysis.symbol, analysis.rank);
    let _ = writeln!(out, "  Current price   ${}", format_number(analysis.price));
    let _ = writeln!(out, "  24h change      {:+.2}%", analysis.change_24h);
    let _ = writeln!(out, "  RSI (14)        {:.1} ({})", analysis.rsi, analysis.rsi_condition);
    let _ = writeln!(out, "  7d momentum     {:+.2}%", analysis.momentum);
    let _ = writeln!(out, "  Volume/Cap      {:.1}%", analysis.volume_to_cap);
    let _ = writeln!(out, "  Signal          {}", analysis.signal);
    let _ = writeln!(
        out,
        "\n  Status: {} | {} Trend | 7d Range: ${} - ${}",
        analysis.rsi_condition,
        analysis.trend,
        format_number(levels.low),
        format_number(levels.high)
    );
    let _ = writeln!(out, "  {}", analysis.narrative());
    let _ = writeln!(
        out,
        "\n  Resistance: ${} (+{:.2}%) | Support: ${} (-{:.2}%)",
        format_number(levels.high),
        levels.resistance_pct,
        format_number(levels.low),
        levels.support_pct
    );

    out
}

fn render_vip_signal(out: &mut String, signal: &VipSignal) {
    let label = signal
        .parsed_signal()
        .map(|known| known.to_string())
        .unwrap_or_else(|| signal.signal.clone());
    let _ = writeln!(out, "  {:<12} {}", signal.pair, label);
    let _ = writeln!(
        out,
        "    RSI {:.1} | Confidence {}% | Win rate {}%{}",
        signal.rsi,
        signal.confidence,
        signal.win_rate,
        signal
            .volume_trend
            .as_deref()
            .map(|t| format!(" | Volume {}", t))
            .unwrap_or_default()
    );
    let _ = writeln!(
        out,
        "    Entry ${:.2} | Target ${:.2} | Stop ${:.2}",
        signal.current_price, signal.target_price, signal.stop_loss
    );
    if !signal.analysis.is_empty() {
        let _ = writeln!(out, "    {}", signal.analysis);
    }
}

pub fn render_vip_signals(response: &VipSignalsResponse) -> String {
    let mut out = String::new();

    if !response.success {
        let reason = response.error.as_deref().unwrap_or("unknown error");
        let _ = writeln!(out, "Unable to load signals: {}", reason);
        return out;
    }

    if response.signals.is_empty() {
        let _ = writeln!(out, "Analyzing markets for premium signals...");
        return out;
    }

    if let Some(top) = &response.top_signal {
        let _ = writeln!(out, "TOP SIGNAL");
        render_vip_signal(&mut out, top);
        out.push('\n');
    }

    let _ = writeln!(out, "SIGNALS ({})", response.signals.len());
    for signal in &response.signals {
        render_vip_signal(&mut out, signal);
    }

    out
}
