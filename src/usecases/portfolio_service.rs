use crate::api_client::{fetch_prices_or_empty, PriceProvider};
use crate::domain::error::TradeError;
use crate::domain::models::{
    supported_symbols, AllocationSlice, EnrichedTrade, PortfolioMetrics,
};
use crate::domain::repository::TradeRepo;
use crate::usecases::valuation::{aggregate, allocation_by_asset, enrich_trades};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

// Everything the dashboard renders in one payload. Derived on every call
// from the stored trades and a fresh price snapshot; nothing in here is a
// source of truth.
#[derive(Debug, Serialize)]
pub struct PortfolioOverview {
    pub metrics: PortfolioMetrics,
    pub trades: Vec<EnrichedTrade>,
    pub allocation: Vec<AllocationSlice>,
    pub prices: HashMap<String, f64>,
    pub as_of: String,
}

pub struct PortfolioService {
    pub provider: Arc<dyn PriceProvider>,
    pub repo: Arc<dyn TradeRepo>,
}

impl PortfolioService {
    pub fn new(provider: Arc<dyn PriceProvider>, repo: Arc<dyn TradeRepo>) -> Self {
        Self { provider, repo }
    }

    pub async fn overview(&self, api_key: &str) -> Result<PortfolioOverview, TradeError> {
        let trades = self.repo.fetch_trades().await?;
        let prices =
            fetch_prices_or_empty(self.provider.as_ref(), api_key, &supported_symbols()).await;

        let enriched = enrich_trades(&trades, &prices);
        let metrics = aggregate(&enriched);
        let allocation = allocation_by_asset(&enriched);

        Ok(PortfolioOverview {
            metrics,
            trades: enriched,
            allocation,
            prices,
            as_of: Utc::now().to_rfc3339(),
        })
    }
}
