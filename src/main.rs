use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get};
use axum::Router;
use dotenv::dotenv;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

mod api_client;
mod domain;
mod infra;
mod usecases;
#[cfg(test)]
mod tests;

use crate::api_client::{PriceProvider, ReqwestPriceProvider};
use crate::domain::error::TradeError;
use crate::domain::models::{supported_symbols, NewTrade, Trade, SUPPORTED_ASSETS};
use crate::domain::repository::TradeRepo;
use crate::infra::sqlite::repo::SqliteRepo;
use crate::usecases::portfolio_service::{PortfolioOverview, PortfolioService};
use crate::usecases::trades_service::{TradesPage, TradesService};
use crate::usecases::valuation::TradeQuery;

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn PriceProvider>,
    repo: Arc<dyn TradeRepo>,
}

fn api_key() -> String {
    std::env::var("API_KEY").unwrap_or_default()
}

fn error_response(err: TradeError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        TradeError::NotFound(_) => StatusCode::NOT_FOUND,
        TradeError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Request failed");
    }
    (status, Json(json!({"error": err.to_string()})))
}

#[tracing::instrument(skip(state))]
async fn api_portfolio(
    State(state): State<AppState>,
) -> Result<Json<PortfolioOverview>, (StatusCode, Json<serde_json::Value>)> {
    let service = PortfolioService::new(state.provider.clone(), state.repo.clone());
    match service.overview(&api_key()).await {
        Ok(overview) => Ok(Json(overview)),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Deserialize)]
struct TradesListQuery {
    search: Option<String>,
    asset: Option<String>,
    sort: Option<String>,
}

async fn api_trades(
    State(state): State<AppState>,
    Query(q): Query<TradesListQuery>,
) -> Result<Json<TradesPage>, (StatusCode, Json<serde_json::Value>)> {
    let query = TradeQuery {
        search_term: q.search,
        asset_filter: q.asset,
        sort_key: Some(q.sort.unwrap_or_else(|| "date_desc".to_string())),
    };
    let service = TradesService::new(state.provider.clone(), state.repo.clone());
    match service.list(&api_key(), &query).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => Err(error_response(e)),
    }
}

async fn api_create_trade(
    State(state): State<AppState>,
    Json(new_trade): Json<NewTrade>,
) -> Result<(StatusCode, Json<Trade>), (StatusCode, Json<serde_json::Value>)> {
    let service = TradesService::new(state.provider.clone(), state.repo.clone());
    match service.create(new_trade).await {
        Ok(trade) => {
            info!(id = ?trade.id, symbol = %trade.cryptocurrency, "Created trade");
            Ok((StatusCode::CREATED, Json(trade)))
        }
        Err(e) => Err(error_response(e)),
    }
}

async fn api_delete_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    let service = TradesService::new(state.provider.clone(), state.repo.clone());
    match service.delete(id).await {
        Ok(()) => {
            info!(id, "Deleted trade");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(error_response(e)),
    }
}

// Strict variant for the explicit refresh button: no historical fallback,
// upstream failure is reported as such.
async fn api_prices(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, f64>>, (StatusCode, Json<serde_json::Value>)> {
    match state
        .provider
        .fetch_current_prices(&api_key(), &supported_symbols())
        .await
    {
        Ok(prices) => Ok(Json(prices)),
        Err(e) => {
            error!(error = %e, "Failed fetching current prices");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": format!("Failed fetching current prices: {}", e)})),
            ))
        }
    }
}

async fn api_assets() -> Json<serde_json::Value> {
    Json(json!({"assets": SUPPORTED_ASSETS.as_slice()}))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/portfolio", get(api_portfolio))
        .route("/api/trades", get(api_trades).post(api_create_trade))
        .route("/api/trades/{id}", delete(api_delete_trade))
        .route("/api/prices", get(api_prices))
        .route("/api/assets", get(api_assets))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt::init();

    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://trades.db?mode=rwc".to_string());
    let pool = SqlitePool::connect(&db_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState {
        provider: Arc::new(ReqwestPriceProvider::new()),
        repo: Arc::new(SqliteRepo::new(pool)),
    };

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    serve(router(state), port).await;

    Ok(())
}

async fn serve(app: Router, port: u16) {
    // Try to bind to the requested port; if it's in use, try a few subsequent ports.
    let max_attempts = 10;
    for offset in 0..max_attempts {
        let try_port = port + offset;
        let addr = SocketAddr::from(([127, 0, 0, 1], try_port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!(%addr, "Listening");
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Server failed while serving");
                }
                return;
            }
            Err(e) => {
                warn!(port = try_port, error = %e, "Port unavailable, trying next");
            }
        }
    }
    error!("Failed to bind to any port in range {}..{}", port, port + max_attempts - 1);
}
