use anyhow::Result;
use csv::ReaderBuilder;
use dotenv::dotenv;
use sqlx::SqlitePool;
use std::env;

// Legacy export row. Older exports carry a date-only purchase_date instead
// of purchase_datetime; rows are inserted as-is, without validation, and the
// valuation layer is expected to cope.
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    cryptocurrency: String,
    amount: f64,
    historical_price: f64,
    #[serde(default)]
    leverage: Option<f64>,
    #[serde(default)]
    purchase_datetime: Option<String>,
    #[serde(default)]
    purchase_date: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trades.db?mode=rwc".to_string());
    let pool = SqlitePool::connect(&db_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let path = env::args().nth(1).unwrap_or_else(|| "trades.csv".to_string());
    println!("Importing '{}' into {}", path, db_url);

    let mut rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_path(&path)?;

    let mut count: usize = 0;
    for result in rdr.deserialize::<CsvRow>() {
        let row = result?;
        let leverage = row.leverage.unwrap_or(1.0);
        let total_investment = row.amount * row.historical_price * leverage;
        sqlx::query(
            "INSERT INTO trades (cryptocurrency, amount, historical_price, leverage, \
             purchase_datetime, purchase_date, total_investment) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&row.cryptocurrency)
        .bind(row.amount)
        .bind(row.historical_price)
        .bind(leverage)
        .bind(&row.purchase_datetime)
        .bind(&row.purchase_date)
        .bind(total_investment)
        .execute(&pool)
        .await?;
        count += 1;
    }
    println!("Inserted {} trade rows", count);
    Ok(())
}
