use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

// CoinMarketCap listings/latest response, trimmed to the fields we read.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ApiResponse {
    pub status: ApiStatus,
    pub data: Vec<CryptoData>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ApiStatus {
    pub timestamp: String,
    pub error_code: i32,
    pub error_message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CryptoData {
    pub id: u32,
    pub name: String,
    pub symbol: String,
    pub quote: QuoteData,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct QuoteData {
    #[serde(rename = "USD")]
    pub usd: PriceInfo,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PriceInfo {
    pub price: f64,
    pub percent_change_24h: Option<f64>,
}

// Current USD prices for a set of symbols. The returned map may be partial
// (symbols the upstream listing does not carry are simply absent); callers
// fall back to historical prices for anything missing.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_current_prices(
        &self,
        api_key: &str,
        symbols: &[&str],
    ) -> Result<HashMap<String, f64>, ReqwestError>;
}

pub struct ReqwestPriceProvider {
    client: Client,
}

impl ReqwestPriceProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl PriceProvider for ReqwestPriceProvider {
    async fn fetch_current_prices(
        &self,
        api_key: &str,
        symbols: &[&str],
    ) -> Result<HashMap<String, f64>, ReqwestError> {
        let url = "https://pro-api.coinmarketcap.com/v1/cryptocurrency/listings/latest";
        let mut params = HashMap::new();
        params.insert("limit", "1000");

        let response = self
            .client
            .get(url)
            .header("X-CMC_PRO_API_KEY", api_key)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let parsed: ApiResponse = response.json().await?;
        debug!(status = ?parsed.status, listed = parsed.data.len());

        let prices: HashMap<String, f64> = parsed
            .data
            .into_iter()
            .filter(|c| symbols.contains(&c.symbol.as_str()))
            .map(|c| (c.symbol, c.quote.usd.price))
            .collect();
        info!(requested = symbols.len(), resolved = prices.len(), "Fetched current prices");
        Ok(prices)
    }
}

// Read-path degradation: a failed fetch logs and yields an empty map, which
// makes every downstream valuation fall back to historical prices.
pub async fn fetch_prices_or_empty(
    provider: &dyn PriceProvider,
    api_key: &str,
    symbols: &[&str],
) -> HashMap<String, f64> {
    match provider.fetch_current_prices(api_key, symbols).await {
        Ok(prices) => prices,
        Err(e) => {
            tracing::warn!(error = %e, "Price fetch failed, valuing against historical prices");
            HashMap::new()
        }
    }
}

// Simple mock provider for tests and handler mocks
pub struct MockPriceProvider {
    pub prices: HashMap<String, f64>,
}

impl MockPriceProvider {
    #[allow(dead_code)]
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    async fn fetch_current_prices(
        &self,
        _api_key: &str,
        _symbols: &[&str],
    ) -> Result<HashMap<String, f64>, ReqwestError> {
        Ok(self.prices.clone())
    }
}
