use crate::api_client::{fetch_prices_or_empty, PriceProvider};
use crate::domain::error::TradeError;
use crate::domain::models::{is_supported_asset, supported_symbols, EnrichedTrade, NewTrade, Trade};
use crate::domain::repository::TradeRepo;
use crate::usecases::valuation::{filter_and_sort, TradeQuery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const MIN_LEVERAGE: f64 = 1.0;
pub const MAX_LEVERAGE: f64 = 125.0;

#[derive(Debug, Serialize)]
pub struct TradesPage {
    pub trades: Vec<EnrichedTrade>,
    // Unfiltered count, for "n of m" displays.
    pub total: usize,
}

pub struct TradesService {
    pub provider: Arc<dyn PriceProvider>,
    pub repo: Arc<dyn TradeRepo>,
}

impl TradesService {
    pub fn new(provider: Arc<dyn PriceProvider>, repo: Arc<dyn TradeRepo>) -> Self {
        Self { provider, repo }
    }

    // Validation happens here and nowhere else; the valuation engine treats
    // whatever is already stored as given.
    pub async fn create(&self, new_trade: NewTrade) -> Result<Trade, TradeError> {
        let purchased_at = validate(&new_trade)?;

        let trade = Trade {
            id: None,
            cryptocurrency: new_trade.cryptocurrency,
            amount: new_trade.amount,
            historical_price: new_trade.historical_price,
            leverage: new_trade.leverage,
            purchase_datetime: Some(purchased_at.to_rfc3339()),
            purchase_date: None,
            total_investment: Some(
                new_trade.amount * new_trade.historical_price * new_trade.leverage,
            ),
            created_at: None,
        };
        Ok(self.repo.insert_trade(&trade).await?)
    }

    pub async fn list(&self, api_key: &str, query: &TradeQuery) -> Result<TradesPage, TradeError> {
        let trades = self.repo.fetch_trades().await?;
        let prices =
            fetch_prices_or_empty(self.provider.as_ref(), api_key, &supported_symbols()).await;
        let total = trades.len();
        Ok(TradesPage {
            trades: filter_and_sort(&trades, &prices, query),
            total,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<(), TradeError> {
        if self.repo.delete_trade(id).await? {
            Ok(())
        } else {
            Err(TradeError::NotFound(id))
        }
    }
}

fn validate(new_trade: &NewTrade) -> Result<DateTime<Utc>, TradeError> {
    if !is_supported_asset(&new_trade.cryptocurrency) {
        return Err(TradeError::UnsupportedAsset(new_trade.cryptocurrency.clone()));
    }
    if !(new_trade.amount > 0.0) {
        return Err(TradeError::NonPositive("amount"));
    }
    if !(new_trade.historical_price > 0.0) {
        return Err(TradeError::NonPositive("historical_price"));
    }
    if !(new_trade.leverage >= MIN_LEVERAGE && new_trade.leverage <= MAX_LEVERAGE) {
        return Err(TradeError::LeverageOutOfRange {
            min: MIN_LEVERAGE,
            max: MAX_LEVERAGE,
        });
    }

    let purchased_at = DateTime::parse_from_rfc3339(&new_trade.purchase_datetime)
        .map_err(|_| TradeError::InvalidDatetime(new_trade.purchase_datetime.clone()))?
        .with_timezone(&Utc);
    if purchased_at > Utc::now() {
        return Err(TradeError::FutureDatetime);
    }
    Ok(purchased_at)
}
