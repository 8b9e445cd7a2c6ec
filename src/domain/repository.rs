use crate::domain::models::Trade;
use async_trait::async_trait;

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
pub trait TradeRepo: Send + Sync {
    // Insert a trade and return the stored row with its assigned id.
    async fn insert_trade(&self, trade: &Trade) -> RepoResult<Trade>;
    // All trades, newest first by creation time.
    async fn fetch_trades(&self) -> RepoResult<Vec<Trade>>;
    // Returns false when no row with this id exists.
    async fn delete_trade(&self, id: i64) -> RepoResult<bool>;
}
