pub mod portfolio_service;
pub mod trades_service;
pub mod valuation;
