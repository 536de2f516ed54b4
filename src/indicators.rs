//! Technical indicators over a short price series
//!
//! Everything here is a pure function of its inputs. Empty or degenerate
//! series fall back to a neutral value or the current price; no function
//! divides by zero or returns an error.

use crate::types::Signal;

/// RSI look-back: 14 deltas, hence 15 points
pub const RSI_PERIOD: usize = 14;

/// RSI returned when there is not enough data to say anything
pub const NEUTRAL_RSI: f64 = 50.0;

/// Relative Strength Index over the first 15 points of `prices`.
///
/// Fewer than two points return [`NEUTRAL_RSI`] by definition. Averages are
/// always taken over 14 periods, even for shorter series. A window with no
/// losing step reads as 100.
pub fn rsi(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return NEUTRAL_RSI;
    }

    let window = &prices[..prices.len().min(RSI_PERIOD + 1)];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(gains, losses), diff| {
            if diff > 0.0 {
                (gains + diff, losses)
            } else {
                (gains, losses - diff)
            }
        });

    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = losses / RSI_PERIOD as f64;
    // No losses pins RSI at exactly 100 rather than clamping RS to 100,
    // which would yield 99.01
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Percent move from the first to the last point; falls back to
/// `change_24h` when the series is too short or starts at zero.
pub fn momentum(prices: &[f64], change_24h: f64) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) if prices.len() >= 2 && first != 0.0 => {
            (last - first) / first * 100.0
        }
        _ => change_24h,
    }
}

/// Distance from the current price to the recent high and low
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLevels {
    pub high: f64,
    pub low: f64,
    /// How far above the price the high sits, in percent
    pub resistance_pct: f64,
    /// How far below the price the low sits, in percent
    pub support_pct: f64,
}

pub fn support_resistance(prices: &[f64], price: f64) -> KeyLevels {
    let (high, low) = if prices.is_empty() {
        (price, price)
    } else {
        prices
            .iter()
            .fold((f64::MIN, f64::MAX), |(hi, lo), &p| (hi.max(p), lo.min(p)))
    };

    let (resistance_pct, support_pct) = if price == 0.0 {
        (0.0, 0.0)
    } else {
        ((high - price) / price * 100.0, (price - low) / price * 100.0)
    };

    KeyLevels {
        high,
        low,
        resistance_pct,
        support_pct,
    }
}

/// Signal-card ladder on the 24h change. Never yields `StrongSell`; that
/// label only arrives from the premium signal feed.
pub fn classify(change_24h: f64) -> Signal {
    if change_24h > 5.0 {
        Signal::StrongBuy
    } else if change_24h > 2.0 {
        Signal::Buy
    } else if change_24h < -5.0 {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Bullet points shown under a signal card
pub fn signal_reasons(signal: Signal) -> [&'static str; 3] {
    match signal {
        Signal::StrongBuy => [
            "Strong upward momentum",
            "High trading volume",
            "Bullish market sentiment",
        ],
        Signal::Buy => [
            "Positive price action",
            "Moderate volume increase",
            "Market interest growing",
        ],
        Signal::Sell | Signal::StrongSell => [
            "Downward trend detected",
            "Decreasing volume",
            "Bearish indicators",
        ],
        Signal::Hold => [
            "Consolidation phase",
            "Neutral indicators",
            "Await clearer signal",
        ],
    }
}

/// 24h volume as a percentage of market cap; 0 when either is missing
pub fn volume_to_market_cap(volume: f64, market_cap: f64) -> f64 {
    if volume > 0.0 && market_cap > 0.0 {
        volume / market_cap * 100.0
    } else {
        0.0
    }
}
