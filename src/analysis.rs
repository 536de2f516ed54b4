//! Per-coin technical analysis report
//!
//! Combines the indicator functions into the summary shown for a single
//! asset: RSI reading, 7-day momentum, key levels and a short narrative.

use serde::Serialize;
use std::fmt;

use crate::indicators::{self, KeyLevels};
use crate::types::{MarketRecord, Signal};

/// RSI reading band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiCondition {
    Overbought,
    Strong,
    Weak,
    Oversold,
}

impl RsiCondition {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi > 70.0 {
            Self::Overbought
        } else if rsi < 30.0 {
            Self::Oversold
        } else if rsi > 50.0 {
            Self::Strong
        } else {
            Self::Weak
        }
    }
}

impl fmt::Display for RsiCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbought => write!(f, "Overbought"),
            Self::Strong => write!(f, "Strong"),
            Self::Weak => write!(f, "Weak"),
            Self::Oversold => write!(f, "Oversold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumStrength {
    Strong,
    Moderate,
    Weak,
}

impl MomentumStrength {
    pub fn from_momentum(momentum: f64) -> Self {
        if momentum > 2.0 {
            Self::Strong
        } else if momentum > 0.0 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

impl fmt::Display for MomentumStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "Strong"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Weak => write!(f, "Weak"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

impl Trend {
    pub fn from_momentum(momentum: f64) -> Self {
        if momentum > 0.0 {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Derived view of one [`MarketRecord`]. Computed on request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinAnalysis {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub rank: u32,
    pub rsi: f64,
    pub rsi_condition: RsiCondition,
    pub momentum: f64,
    pub momentum_strength: MomentumStrength,
    pub trend: Trend,
    pub volume_to_cap: f64,
    pub levels: KeyLevels,
    pub signal: Signal,
}

impl CoinAnalysis {
    pub fn from_record(record: &MarketRecord) -> Self {
        let prices = record.prices();
        let price = record.current_price;
        let change_24h = record.price_change_percentage_24h;

        let rsi = indicators::rsi(prices);
        let momentum = indicators::momentum(prices, change_24h);

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            symbol: record.symbol.to_uppercase(),
            price,
            change_24h,
            rank: record.rank(),
            rsi,
            rsi_condition: RsiCondition::from_rsi(rsi),
            momentum,
            momentum_strength: MomentumStrength::from_momentum(momentum),
            trend: Trend::from_momentum(momentum),
            volume_to_cap: indicators::volume_to_market_cap(record.total_volume, record.market_cap),
            levels: indicators::support_resistance(prices, price),
            signal: indicators::classify(change_24h),
        }
    }

    /// One-paragraph reading keyed on the 24h change
    pub fn narrative(&self) -> String {
        let condition = self.rsi_condition.to_string().to_lowercase();
        let rsi = self.rsi;
        let vol = self.volume_to_cap;
        let resistance = self.levels.resistance_pct;
        let support = self.levels.support_pct;
        let change = self.change_24h;

        if change > 8.0 {
            format!(
                "Exceptional bullish strength! {} {} momentum with {} RSI ({:.1}). \
                 Volume/MarketCap ratio of {:.1}% indicates strong trading activity. \
                 Resistance at +{:.2}%, Support at -{:.2}%.",
                self.momentum_strength, self.trend, condition, rsi, vol, resistance, support
            )
        } else if change > 3.0 {
            format!(
                "Positive momentum detected. {} RSI at {:.1} ({}). Volume activity at {:.1}% \
                 of market cap. Watch for breakout above resistance at {:.2}%.",
                self.trend, rsi, self.rsi_condition, vol, resistance
            )
        } else if change > 0.0 {
            format!(
                "Slight positive bias with {} RSI ({:.1}). Consolidating near support at \
                 -{:.2}%. Moderate volume at {:.1}% of cap.",
                condition, rsi, support, vol
            )
        } else if change > -3.0 {
            format!(
                "Mild downward pressure. RSI {} at {:.1}. Price holding above {:.2}% support \
                 level. Monitor for stabilization.",
                condition, rsi, support
            )
        } else if change > -8.0 {
            format!(
                "Bearish trend with {} RSI ({:.1}). {} momentum showing weakness. \
                 Support-seeking price action. Volume/cap ratio: {:.1}%.",
                condition, rsi, self.trend, vol
            )
        } else {
            format!(
                "Strong bearish pressure! Severe downtrend with {} RSI. {} momentum confirmed. \
                 Trading volume significant at {:.1}% of market cap. Critical support at -{:.2}%.",
                condition, self.trend, vol, support
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sparkline;

    fn record(prices: Vec<f64>, price: f64, change: f64) -> MarketRecord {
        MarketRecord {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            image: String::new(),
            current_price: price,
            price_change_percentage_24h: change,
            total_volume: 30.0e9,
            market_cap: 1.2e12,
            market_cap_rank: Some(1),
            sparkline_in_7d: Some(Sparkline { price: prices }),
        }
    }

    #[test]
    fn test_rsi_condition_bands() {
        assert_eq!(RsiCondition::from_rsi(75.0), RsiCondition::Overbought);
        assert_eq!(RsiCondition::from_rsi(60.0), RsiCondition::Strong);
        assert_eq!(RsiCondition::from_rsi(50.0), RsiCondition::Weak);
        assert_eq!(RsiCondition::from_rsi(29.9), RsiCondition::Oversold);
    }

    #[test]
    fn test_momentum_bands() {
        assert_eq!(MomentumStrength::from_momentum(2.5), MomentumStrength::Strong);
        assert_eq!(MomentumStrength::from_momentum(0.5), MomentumStrength::Moderate);
        assert_eq!(MomentumStrength::from_momentum(0.0), MomentumStrength::Weak);
        assert_eq!(Trend::from_momentum(0.0), Trend::Bearish);
    }

    #[test]
    fn test_from_record_rising_coin() {
        let analysis = CoinAnalysis::from_record(&record(vec![100.0, 105.0, 110.0], 110.0, 6.0));

        assert_eq!(analysis.symbol, "BTC");
        assert_eq!(analysis.rsi, 100.0);
        assert_eq!(analysis.rsi_condition, RsiCondition::Overbought);
        assert!((analysis.momentum - 10.0).abs() < 1e-9);
        assert_eq!(analysis.trend, Trend::Bullish);
        assert_eq!(analysis.signal, Signal::StrongBuy);
        assert!((analysis.volume_to_cap - 2.5).abs() < 1e-9);
        assert!((analysis.levels.support_pct - (10.0 / 110.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_from_record_without_sparkline() {
        let mut coin = record(vec![], 50.0, -1.5);
        coin.sparkline_in_7d = None;
        let analysis = CoinAnalysis::from_record(&coin);

        assert_eq!(analysis.rsi, 50.0);
        assert_eq!(analysis.momentum, -1.5);
        assert_eq!(analysis.levels.high, 50.0);
        assert_eq!(analysis.signal, Signal::Hold);
    }

    #[test]
    fn test_narrative_follows_change_ladder() {
        let text = |change: f64| CoinAnalysis::from_record(&record(vec![1.0, 2.0], 2.0, change)).narrative();

        assert!(text(9.0).starts_with("Exceptional bullish strength!"));
        assert!(text(4.0).starts_with("Positive momentum detected."));
        assert!(text(1.0).starts_with("Slight positive bias"));
        assert!(text(-1.0).starts_with("Mild downward pressure."));
        assert!(text(-5.0).starts_with("Bearish trend"));
        assert!(text(-9.0).starts_with("Strong bearish pressure!"));
    }
}
