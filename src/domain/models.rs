use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

// Persisted trade row (trades table). A row always carries the numeric
// fields, but legacy imports may leave the datetime split across
// purchase_datetime / purchase_date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Option<i64>,
    pub cryptocurrency: String,
    pub amount: f64,
    pub historical_price: f64,
    pub leverage: f64,
    pub purchase_datetime: Option<String>, // RFC3339
    pub purchase_date: Option<String>,     // legacy, date-only
    pub total_investment: Option<f64>,     // snapshot taken at creation
    pub created_at: Option<String>,
}

// Creation payload for the add-trade flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrade {
    pub cryptocurrency: String,
    pub amount: f64,
    pub historical_price: f64,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
    pub purchase_datetime: String,
}

fn default_leverage() -> f64 {
    1.0
}

// Trade plus derived valuation fields. Ephemeral: recomputed from the
// current price map on every read, never stored. Derived fields serialize
// camelCase, which is the shape the dashboard frontend consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTrade {
    #[serde(flatten)]
    pub trade: Trade,
    pub current_price: f64,
    pub investment: f64, // amount * historical_price, pre-leverage
    pub leveraged_investment: f64,
    pub current_value: f64,
    pub pnl: f64,
    pub pnl_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub total_investment: f64,
    pub current_value: f64,
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    #[serde(rename = "totalPnLPercentage")]
    pub total_pnl_percentage: f64,
}

// One asset's share of the portfolio's current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub symbol: String,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub symbol: &'static str,
    pub name: &'static str,
}

pub static SUPPORTED_ASSETS: [Asset; 8] = [
    Asset { symbol: "BTC", name: "Bitcoin" },
    Asset { symbol: "ETH", name: "Ethereum" },
    Asset { symbol: "SOL", name: "Solana" },
    Asset { symbol: "ADA", name: "Cardano" },
    Asset { symbol: "DOT", name: "Polkadot" },
    Asset { symbol: "AVAX", name: "Avalanche" },
    Asset { symbol: "LINK", name: "Chainlink" },
    Asset { symbol: "MATIC", name: "Polygon" },
];

static ASSET_INDEX: Lazy<HashMap<&'static str, &'static Asset>> =
    Lazy::new(|| SUPPORTED_ASSETS.iter().map(|a| (a.symbol, a)).collect());

pub fn is_supported_asset(symbol: &str) -> bool {
    ASSET_INDEX.contains_key(symbol)
}

pub fn supported_symbols() -> Vec<&'static str> {
    SUPPORTED_ASSETS.iter().map(|a| a.symbol).collect()
}
