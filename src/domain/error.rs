use thiserror::Error;

// Errors surfaced by the trade lifecycle flows. The valuation engine itself
// is total and never produces one of these; validation variants can only
// originate in the creation flow.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("unsupported cryptocurrency: {0}")]
    UnsupportedAsset(String),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("leverage must be between {min} and {max}")]
    LeverageOutOfRange { min: f64, max: f64 },
    #[error("purchase_datetime is not a valid RFC3339 timestamp: {0}")]
    InvalidDatetime(String),
    #[error("purchase_datetime must not be in the future")]
    FutureDatetime,
    #[error("trade not found: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Repo(#[from] Box<dyn std::error::Error + Send + Sync>),
}
