use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Treats JSON `null` (and a missing field) as zero; the upstream market API
/// leaves numerics empty for freshly listed assets.
fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// One tracked asset, as served by `/api/markets` and the price feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub price_change_percentage_24h: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_volume: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub market_cap: f64,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

impl MarketRecord {
    /// 7-day price series, oldest first. Empty when the API sent none.
    pub fn prices(&self) -> &[f64] {
        self.sparkline_in_7d
            .as_ref()
            .map(|s| s.price.as_slice())
            .unwrap_or(&[])
    }

    /// Market-cap rank, defaulting to 1 when absent
    pub fn rank(&self) -> u32 {
        self.market_cap_rank.unwrap_or(1)
    }

    /// Trading pair label, e.g. "BTC/USD"
    pub fn pair(&self) -> String {
        format!("{}/USD", self.symbol.to_uppercase())
    }
}

/// Aggregate market metrics from `/api/global`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_market_cap: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub market_cap_change_24h: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_volume: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub btc_dominance: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub eth_dominance: f64,
    #[serde(default)]
    pub active_cryptocurrencies: Option<u64>,
}

impl GlobalMetrics {
    /// A zeroed payload is treated the same as no payload at all
    pub fn has_data(&self) -> bool {
        self.total_market_cap > 0.0
    }
}

/// Sentiment score from `/api/fear-greed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FearGreedIndex {
    pub value: u8,
    #[serde(default)]
    pub classification: String,
}

/// Coarse trading signal label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Signal {
    /// Kebab-case label used by the public signal cards
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "strong-buy",
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
            Self::StrongSell => "strong-sell",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "STRONG BUY"),
            Self::Buy => write!(f, "BUY"),
            Self::Hold => write!(f, "HOLD"),
            Self::Sell => write!(f, "SELL"),
            Self::StrongSell => write!(f, "STRONG SELL"),
        }
    }
}

impl FromStr for Signal {
    type Err = anyhow::Error;

    /// Accepts both "strong-buy" and "STRONG BUY" spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "strong-buy" => Ok(Self::StrongBuy),
            "buy" => Ok(Self::Buy),
            "hold" | "neutral" => Ok(Self::Hold),
            "sell" => Ok(Self::Sell),
            "strong-sell" => Ok(Self::StrongSell),
            _ => Err(anyhow::anyhow!("unknown signal label: {}", s)),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.to_string()
    }
}

/// One entry of `/api/vip/signals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipSignal {
    pub pair: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub rsi: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub win_rate: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub target_price: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub stop_loss: f64,
    #[serde(default)]
    pub analysis: String,
    /// Label as sent by the server; see [`VipSignal::parsed_signal`]
    #[serde(default)]
    pub signal: String,
    #[serde(default)]
    pub volume_trend: Option<String>,
}

impl VipSignal {
    /// `None` for labels outside the five known tiers
    pub fn parsed_signal(&self) -> Option<Signal> {
        self.signal.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipSignalsResponse {
    pub success: bool,
    #[serde(default)]
    pub signals: Vec<VipSignal>,
    #[serde(default)]
    pub top_signal: Option<VipSignal>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `/api/health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}
