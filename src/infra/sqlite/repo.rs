use crate::domain::models::Trade;
use crate::domain::repository::{RepoResult, TradeRepo};
use async_trait::async_trait;
use sqlx::SqlitePool;

const TRADE_COLUMNS: &str = "id, cryptocurrency, amount, historical_price, leverage, \
     purchase_datetime, purchase_date, total_investment, created_at";

pub struct SqliteRepo {
    pub pool: SqlitePool,
}

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRepo for SqliteRepo {
    async fn insert_trade(&self, trade: &Trade) -> RepoResult<Trade> {
        let sql = format!(
            "INSERT INTO trades (cryptocurrency, amount, historical_price, leverage, \
             purchase_datetime, purchase_date, total_investment) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             RETURNING {TRADE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Trade>(&sql)
            .bind(&trade.cryptocurrency)
            .bind(trade.amount)
            .bind(trade.historical_price)
            .bind(trade.leverage)
            .bind(&trade.purchase_datetime)
            .bind(&trade.purchase_date)
            .bind(trade.total_investment)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn fetch_trades(&self) -> RepoResult<Vec<Trade>> {
        let sql = format!("SELECT {TRADE_COLUMNS} FROM trades ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, Trade>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn delete_trade(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM trades WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
