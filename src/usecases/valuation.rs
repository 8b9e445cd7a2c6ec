use crate::domain::models::{AllocationSlice, EnrichedTrade, PortfolioMetrics, Trade};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;

// Sentinel accepted by TradeQuery::asset_filter to bypass asset filtering.
pub const ASSET_FILTER_ALL: &str = "all";

#[derive(Debug, Clone, Default)]
pub struct TradeQuery {
    pub search_term: Option<String>,
    pub asset_filter: Option<String>,
    pub sort_key: Option<String>,
}

// Derive the valuation fields for a single trade. This is the only place the
// formula exists: leverage is applied exactly once, and P&L is measured
// against the leveraged investment base. Missing prices fall back to the
// trade's own historical price (valuation as if the price never moved).
pub fn enrich_trade(trade: &Trade, prices: &HashMap<String, f64>) -> EnrichedTrade {
    let current_price = prices
        .get(&trade.cryptocurrency)
        .copied()
        .unwrap_or(trade.historical_price);
    let investment = trade.amount * trade.historical_price;
    let leveraged_investment = investment * trade.leverage;
    let current_value = trade.amount * current_price * trade.leverage;
    let pnl = current_value - leveraged_investment;
    // Guard: legacy rows may carry a zero amount or price.
    let pnl_percentage = if leveraged_investment > 0.0 {
        (pnl / leveraged_investment) * 100.0
    } else {
        0.0
    };

    EnrichedTrade {
        trade: trade.clone(),
        current_price,
        investment,
        leveraged_investment,
        current_value,
        pnl,
        pnl_percentage,
    }
}

pub fn enrich_trades(trades: &[Trade], prices: &HashMap<String, f64>) -> Vec<EnrichedTrade> {
    trades.iter().map(|t| enrich_trade(t, prices)).collect()
}

pub fn aggregate(enriched: &[EnrichedTrade]) -> PortfolioMetrics {
    let mut total_investment = 0.0;
    let mut current_value = 0.0;
    let mut total_pnl = 0.0;

    for e in enriched {
        total_investment += e.leveraged_investment;
        current_value += e.current_value;
        total_pnl += e.pnl;
    }

    let total_pnl_percentage = if total_investment > 0.0 {
        (total_pnl / total_investment) * 100.0
    } else {
        0.0
    };

    PortfolioMetrics {
        total_investment,
        current_value,
        total_pnl,
        total_pnl_percentage,
    }
}

// Current value grouped by asset, one slice per distinct symbol, each with
// its percentage of the grand total. Sorted (value desc, symbol asc) so
// identical inputs serialize identically.
pub fn allocation_by_asset(enriched: &[EnrichedTrade]) -> Vec<AllocationSlice> {
    let mut values: HashMap<String, f64> = HashMap::new();
    for e in enriched {
        *values.entry(e.trade.cryptocurrency.clone()).or_insert(0.0) += e.current_value;
    }

    let total: f64 = values.values().sum();
    let mut slices: Vec<AllocationSlice> = values
        .into_iter()
        .map(|(symbol, value)| {
            let percentage = if total > 0.0 { (value / total) * 100.0 } else { 0.0 };
            AllocationSlice {
                symbol,
                value,
                percentage,
            }
        })
        .collect();
    slices.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.symbol.cmp(&b.symbol)));
    slices
}

// Filter, then enrich only the surviving trades, then sort. Sorts are stable:
// equal keys keep their input order. An unrecognized sort key reorders
// nothing.
pub fn filter_and_sort(
    trades: &[Trade],
    prices: &HashMap<String, f64>,
    query: &TradeQuery,
) -> Vec<EnrichedTrade> {
    let mut filtered: Vec<&Trade> = trades.iter().collect();

    if let Some(term) = query.search_term.as_deref().filter(|s| !s.is_empty()) {
        let needle = term.to_lowercase();
        filtered.retain(|t| t.cryptocurrency.to_lowercase().contains(&needle));
    }

    if let Some(asset) = query.asset_filter.as_deref() {
        if !asset.eq_ignore_ascii_case(ASSET_FILTER_ALL) {
            filtered.retain(|t| t.cryptocurrency == asset);
        }
    }

    let mut enriched: Vec<EnrichedTrade> =
        filtered.into_iter().map(|t| enrich_trade(t, prices)).collect();

    match query.sort_key.as_deref() {
        Some("date_desc") => {
            enriched.sort_by(|a, b| purchase_timestamp(&b.trade).cmp(&purchase_timestamp(&a.trade)))
        }
        Some("date_asc") => {
            enriched.sort_by(|a, b| purchase_timestamp(&a.trade).cmp(&purchase_timestamp(&b.trade)))
        }
        Some("pnl_desc") => enriched.sort_by(|a, b| b.pnl.total_cmp(&a.pnl)),
        Some("pnl_asc") => enriched.sort_by(|a, b| a.pnl.total_cmp(&b.pnl)),
        Some("value_desc") => enriched.sort_by(|a, b| b.current_value.total_cmp(&a.current_value)),
        Some("value_asc") => enriched.sort_by(|a, b| a.current_value.total_cmp(&b.current_value)),
        _ => {}
    }

    enriched
}

// purchase_datetime with fallback to the legacy date-only column. Rows where
// neither parses sort to the epoch.
fn purchase_timestamp(trade: &Trade) -> DateTime<Utc> {
    let raw = trade
        .purchase_datetime
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(trade.purchase_date.as_deref())
        .unwrap_or("");

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_time(NaiveTime::MIN).and_utc();
    }
    DateTime::<Utc>::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(id: i64, symbol: &str, amount: f64, price: f64, leverage: f64) -> Trade {
        Trade {
            id: Some(id),
            cryptocurrency: symbol.to_string(),
            amount,
            historical_price: price,
            leverage,
            purchase_datetime: Some("2024-03-01T12:00:00Z".to_string()),
            purchase_date: None,
            total_investment: Some(amount * price * leverage),
            created_at: None,
        }
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn enrich_matches_leveraged_scenario() {
        let trade = make_trade(1, "BTC", 1.0, 100.0, 10.0);
        let e = enrich_trade(&trade, &prices(&[("BTC", 150.0)]));
        assert_eq!(e.current_price, 150.0);
        assert_eq!(e.investment, 100.0);
        assert_eq!(e.leveraged_investment, 1000.0);
        assert_eq!(e.current_value, 1500.0);
        assert_eq!(e.pnl, 500.0);
        assert_eq!(e.pnl_percentage, 50.0);
    }

    #[test]
    fn empty_price_map_falls_back_to_historical_price() {
        let trade = make_trade(1, "ETH", 2.5, 40.0, 3.0);
        let e = enrich_trade(&trade, &HashMap::new());
        assert_eq!(e.current_price, 40.0);
        assert_eq!(e.current_value, e.leveraged_investment);
        assert_eq!(e.pnl, 0.0);
        assert_eq!(e.pnl_percentage, 0.0);
    }

    #[test]
    fn partial_price_map_only_affects_listed_symbols() {
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
            make_trade(2, "ETH", 1.0, 50.0, 1.0),
        ];
        let enriched = enrich_trades(&trades, &prices(&[("BTC", 110.0)]));
        assert_eq!(enriched[0].pnl, 10.0);
        assert_eq!(enriched[1].pnl, 0.0);
        assert_eq!(enriched[1].current_price, 50.0);
    }

    #[test]
    fn zero_investment_base_yields_zero_percentage_not_nan() {
        let trade = make_trade(1, "BTC", 0.0, 100.0, 10.0);
        let e = enrich_trade(&trade, &prices(&[("BTC", 150.0)]));
        assert_eq!(e.pnl_percentage, 0.0);
        assert!(!e.pnl_percentage.is_nan());

        // Malformed legacy row: negative price must not panic either.
        let bad = make_trade(2, "BTC", 1.0, -5.0, 1.0);
        let e = enrich_trade(&bad, &HashMap::new());
        assert_eq!(e.pnl_percentage, 0.0);
    }

    #[test]
    fn enrich_does_not_touch_the_stored_snapshot() {
        let trade = make_trade(1, "BTC", 1.0, 100.0, 2.0);
        let e = enrich_trade(&trade, &prices(&[("BTC", 500.0)]));
        assert_eq!(e.trade.total_investment, Some(200.0));
        assert_eq!(trade.historical_price, 100.0);
    }

    #[test]
    fn aggregate_empty_is_all_zero() {
        let m = aggregate(&[]);
        assert_eq!(m.total_investment, 0.0);
        assert_eq!(m.current_value, 0.0);
        assert_eq!(m.total_pnl, 0.0);
        assert_eq!(m.total_pnl_percentage, 0.0);
    }

    #[test]
    fn aggregate_sums_leveraged_bases() {
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 10.0),
            make_trade(2, "ETH", 2.0, 50.0, 1.0),
        ];
        let enriched = enrich_trades(&trades, &prices(&[("BTC", 150.0), ("ETH", 25.0)]));
        let m = aggregate(&enriched);
        assert_eq!(m.total_investment, 1100.0);
        assert_eq!(m.current_value, 1550.0);
        assert_eq!(m.total_pnl, 450.0);
        assert!((m.total_pnl_percentage - 450.0 / 1100.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn allocation_groups_same_asset_and_splits_percentages() {
        let trades = vec![
            make_trade(1, "SOL", 3.0, 100.0, 1.0),
            make_trade(2, "SOL", 7.0, 100.0, 1.0),
        ];
        let enriched = enrich_trades(&trades, &prices(&[("SOL", 100.0)]));
        let slices = allocation_by_asset(&enriched);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].symbol, "SOL");
        assert_eq!(slices[0].value, 1000.0);
        assert!((slices[0].percentage - 100.0).abs() < 1e-9);

        // Two assets valued 300 and 700 split 30% / 70%.
        let trades = vec![
            make_trade(1, "SOL", 3.0, 100.0, 1.0),
            make_trade(2, "ADA", 7.0, 100.0, 1.0),
        ];
        let enriched = enrich_trades(&trades, &prices(&[("SOL", 100.0), ("ADA", 100.0)]));
        let slices = allocation_by_asset(&enriched);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].symbol, "ADA");
        assert!((slices[0].percentage - 70.0).abs() < 1e-9);
        assert_eq!(slices[1].symbol, "SOL");
        assert!((slices[1].percentage - 30.0).abs() < 1e-9);
    }

    #[test]
    fn allocation_conserves_total_current_value() {
        let trades = vec![
            make_trade(1, "BTC", 0.3, 60000.0, 2.0),
            make_trade(2, "ETH", 4.0, 2500.0, 5.0),
            make_trade(3, "BTC", 0.1, 55000.0, 1.0),
        ];
        let enriched = enrich_trades(&trades, &prices(&[("BTC", 64000.0), ("ETH", 2400.0)]));
        let slices = allocation_by_asset(&enriched);
        let slice_total: f64 = slices.iter().map(|s| s.value).sum();
        let value_total: f64 = enriched.iter().map(|e| e.current_value).sum();
        assert!((slice_total - value_total).abs() < 1e-9);
    }

    #[test]
    fn allocation_of_worthless_portfolio_has_zero_percentages() {
        let trades = vec![make_trade(1, "BTC", 0.0, 100.0, 1.0)];
        let enriched = enrich_trades(&trades, &HashMap::new());
        let slices = allocation_by_asset(&enriched);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].value, 0.0);
        assert_eq!(slices[0].percentage, 0.0);
    }

    #[test]
    fn allocation_of_empty_portfolio_is_empty() {
        assert!(allocation_by_asset(&[]).is_empty());
    }

    #[test]
    fn search_filter_is_case_insensitive_substring() {
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
            make_trade(2, "ETH", 1.0, 100.0, 1.0),
        ];
        let query = TradeQuery {
            search_term: Some("bt".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&trades, &HashMap::new(), &query);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].trade.cryptocurrency, "BTC");
    }

    #[test]
    fn asset_filter_without_match_returns_empty() {
        let trades = vec![make_trade(1, "ETH", 1.0, 100.0, 1.0)];
        let query = TradeQuery {
            asset_filter: Some("BTC".to_string()),
            ..Default::default()
        };
        assert!(filter_and_sort(&trades, &HashMap::new(), &query).is_empty());
    }

    #[test]
    fn asset_filter_all_sentinel_bypasses_filtering() {
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
            make_trade(2, "ETH", 1.0, 100.0, 1.0),
        ];
        let query = TradeQuery {
            asset_filter: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_and_sort(&trades, &HashMap::new(), &query).len(), 2);
    }

    #[test]
    fn pnl_desc_orders_gains_first() {
        // pnl per trade: BTC -5, ETH +20, SOL 0
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
            make_trade(2, "ETH", 1.0, 100.0, 1.0),
            make_trade(3, "SOL", 1.0, 100.0, 1.0),
        ];
        let map = prices(&[("BTC", 95.0), ("ETH", 120.0), ("SOL", 100.0)]);
        let query = TradeQuery {
            sort_key: Some("pnl_desc".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&trades, &map, &query);
        let pnls: Vec<f64> = out.iter().map(|e| e.pnl).collect();
        assert_eq!(pnls, vec![20.0, 0.0, -5.0]);
    }

    #[test]
    fn value_sort_is_stable_for_equal_keys() {
        let trades = vec![
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
            make_trade(2, "ETH", 2.0, 50.0, 1.0),
            make_trade(3, "SOL", 4.0, 25.0, 1.0),
        ];
        // No live prices: every current value is 100, so input order must hold.
        let query = TradeQuery {
            sort_key: Some("value_desc".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&trades, &HashMap::new(), &query);
        let ids: Vec<i64> = out.iter().map(|e| e.trade.id.unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn unrecognized_sort_key_preserves_order() {
        let trades = vec![
            make_trade(2, "ETH", 1.0, 100.0, 1.0),
            make_trade(1, "BTC", 1.0, 100.0, 1.0),
        ];
        let query = TradeQuery {
            sort_key: Some("sideways".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&trades, &HashMap::new(), &query);
        let ids: Vec<i64> = out.iter().map(|e| e.trade.id.unwrap()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn date_sort_falls_back_to_legacy_purchase_date() {
        let mut old = make_trade(1, "BTC", 1.0, 100.0, 1.0);
        old.purchase_datetime = None;
        old.purchase_date = Some("2023-05-10".to_string());
        let new = make_trade(2, "ETH", 1.0, 100.0, 1.0); // 2024-03-01T12:00:00Z

        let query = TradeQuery {
            sort_key: Some("date_asc".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&[new.clone(), old.clone()], &HashMap::new(), &query);
        let ids: Vec<i64> = out.iter().map(|e| e.trade.id.unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);

        let query = TradeQuery {
            sort_key: Some("date_desc".to_string()),
            ..Default::default()
        };
        let out = filter_and_sort(&[new, old], &HashMap::new(), &query);
        let ids: Vec<i64> = out.iter().map(|e| e.trade.id.unwrap()).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
