//! Error types for stock query operations

use chrono::NaiveDate;
use thiserror::Error;

/// Infrastructure errors: data sources, configuration, caches
#[derive(Debug, Error)]
pub enum StockError {
    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Request exceeded the configured timeout
    #[error("Request for {symbol} timed out after {seconds}s")]
    Timeout {
        symbol: String,
        seconds: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Two aliases map to different instruments
    #[error("Alias {alias:?} is already bound to {existing}, cannot bind it to {requested}")]
    AliasCollision {
        alias: String,
        existing: String,
        requested: String,
    },

    /// Price series violates ordering invariants
    #[error("Invalid price series: {0}")]
    InvalidSeries(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl From<stock_utils::EnvError> for StockError {
    fn from(err: stock_utils::EnvError) -> Self {
        StockError::ConfigError(err.to_string())
    }
}

/// Recoverable outcome of a single query.
///
/// Every variant maps to a user-facing message; none of them stops the bot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Alias not present in the alias table
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// Date-shaped literal that is not a calendar date
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Range whose end precedes its start
    #[error("invalid range: {start} > {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// No session on or before the target within the look-back bound
    #[error("no trading session within {lookback_days} days before {target}")]
    NoEligibleSession { target: NaiveDate, lookback_days: u32 },

    /// Empty series or empty filtered range
    #[error("no data")]
    NoData,

    /// Rolling window larger than the sessions available
    #[error("insufficient data: {requested} sessions requested, {available} available")]
    InsufficientData { requested: usize, available: usize },
}
