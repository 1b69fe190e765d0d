//! Configuration for stock query operations

use crate::error::{Result, StockError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use stock_utils::config::{env_flag, env_var};

/// Calendar days searched backwards for a prior trading session
pub const DEFAULT_LOOKBACK_DAYS: u32 = 25;

/// Upper bound on a single retry delay
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Configuration for stock query operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Look-back bound for point lookups, in calendar days
    pub lookback_days: u32,

    /// Start of the range used when `平均`/`最高`/`最低` carry no dates
    pub default_range_start: NaiveDate,

    /// End of the default range (inclusive)
    pub default_range_end: NaiveDate,

    /// Suffix appended to bare numeric codes when calling the data source
    pub market_suffix: String,

    /// UTC offset of the exchange, used to turn timestamps into trading dates
    pub market_utc_offset_hours: i32,

    /// Cache TTL for fetched price series
    pub cache_ttl_series: Duration,

    /// Maximum number of attempts for data source calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Client-side rate limit for the data source
    pub requests_per_minute: u32,

    /// Fetch batch members concurrently
    pub parallel_batch: bool,

    /// Extra alias table loaded at start-up
    pub alias_file: Option<PathBuf>,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            default_range_start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            default_range_end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            market_suffix: ".TW".to_string(),
            market_utc_offset_hours: 8,
            cache_ttl_series: Duration::from_secs(300), // 5 minutes
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            requests_per_minute: 60,
            parallel_batch: false,
            alias_file: None,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Defaults overridden by `STOCK_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.lookback_days == 0 {
            return Err(StockError::ConfigError(
                "lookback_days must be greater than 0".to_string(),
            ));
        }

        if self.default_range_end < self.default_range_start {
            return Err(StockError::ConfigError(format!(
                "default range end {} precedes start {}",
                self.default_range_end, self.default_range_start
            )));
        }

        if self.max_retries == 0 {
            return Err(StockError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.requests_per_minute == 0 {
            return Err(StockError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if !(-12..=14).contains(&self.market_utc_offset_hours) {
            return Err(StockError::ConfigError(format!(
                "market_utc_offset_hours {} out of range",
                self.market_utc_offset_hours
            )));
        }

        Ok(())
    }

    /// Get retry backoff duration for attempt number, capped at [`MAX_RETRY_BACKOFF`]
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.retry_backoff_base.checked_mul(factor))
            .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    lookback_days: Option<u32>,
    default_range_start: Option<NaiveDate>,
    default_range_end: Option<NaiveDate>,
    market_suffix: Option<String>,
    market_utc_offset_hours: Option<i32>,
    cache_ttl_series: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
    parallel_batch: Option<bool>,
    alias_file: Option<PathBuf>,
}

impl StockConfigBuilder {
    /// Set the point lookup look-back bound
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    /// Set the default query range
    pub fn default_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.default_range_start = Some(start);
        self.default_range_end = Some(end);
        self
    }

    /// Set the market suffix for bare codes
    pub fn market_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.market_suffix = Some(suffix.into());
        self
    }

    /// Set the exchange UTC offset
    pub fn market_utc_offset_hours(mut self, hours: i32) -> Self {
        self.market_utc_offset_hours = Some(hours);
        self
    }

    /// Set cache TTL for price series
    pub fn cache_ttl_series(mut self, duration: Duration) -> Self {
        self.cache_ttl_series = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the client-side rate limit
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Fetch batch members concurrently
    pub fn parallel_batch(mut self, parallel: bool) -> Self {
        self.parallel_batch = Some(parallel);
        self
    }

    /// Load extra aliases from a JSON file
    pub fn alias_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.alias_file = Some(path.into());
        self
    }

    /// Apply `STOCK_*` environment overrides
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(days) = env_var::<u32>("STOCK_LOOKBACK_DAYS")? {
            self.lookback_days = Some(days);
        }
        if let Some(start) = env_var::<NaiveDate>("STOCK_DEFAULT_START")? {
            self.default_range_start = Some(start);
        }
        if let Some(end) = env_var::<NaiveDate>("STOCK_DEFAULT_END")? {
            self.default_range_end = Some(end);
        }
        if let Some(suffix) = env_var::<String>("STOCK_MARKET_SUFFIX")? {
            self.market_suffix = Some(suffix);
        }
        if let Some(hours) = env_var::<i32>("STOCK_UTC_OFFSET_HOURS")? {
            self.market_utc_offset_hours = Some(hours);
        }
        if let Some(secs) = env_var::<u64>("STOCK_CACHE_TTL_SECS")? {
            self.cache_ttl_series = Some(Duration::from_secs(secs));
        }
        if let Some(retries) = env_var::<u32>("STOCK_MAX_RETRIES")? {
            self.max_retries = Some(retries);
        }
        if let Some(rpm) = env_var::<u32>("STOCK_REQUESTS_PER_MINUTE")? {
            self.requests_per_minute = Some(rpm);
        }
        if let Some(parallel) = env_flag("STOCK_PARALLEL_BATCH")? {
            self.parallel_batch = Some(parallel);
        }
        if let Some(path) = env_var::<PathBuf>("STOCK_ALIAS_FILE")? {
            self.alias_file = Some(path);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
            default_range_start: self
                .default_range_start
                .unwrap_or(defaults.default_range_start),
            default_range_end: self.default_range_end.unwrap_or(defaults.default_range_end),
            market_suffix: self.market_suffix.unwrap_or(defaults.market_suffix),
            market_utc_offset_hours: self
                .market_utc_offset_hours
                .unwrap_or(defaults.market_utc_offset_hours),
            cache_ttl_series: self.cache_ttl_series.unwrap_or(defaults.cache_ttl_series),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            parallel_batch: self.parallel_batch.unwrap_or(defaults.parallel_batch),
            alias_file: self.alias_file,
        };

        config.validate()?;
        Ok(config)
    }
}
