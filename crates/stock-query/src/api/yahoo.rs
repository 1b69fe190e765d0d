//! Yahoo Finance API client

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::series::{LiveQuote, PriceSeries, QuoteProvider, SeriesProvider};
use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Yahoo Finance client for daily closes and live quotes.
///
/// Requests are rate limited, bounded by the configured timeout and retried
/// with exponential backoff.
pub struct YahooFinanceClient {
    connector: yahoo::YahooConnector,
    config: Arc<StockConfig>,
    rate_limiter: SharedRateLimiter,
    offset: FixedOffset,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new(config: Arc<StockConfig>) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
        let offset = market_offset(config.market_utc_offset_hours)?;
        let quota = Quota::per_minute(
            NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN),
        );

        Ok(Self {
            connector,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            config,
            offset,
        })
    }

    /// Exchange-qualified ticker: bare codes get the market suffix
    pub fn market_symbol(&self, symbol: &str) -> String {
        qualify_symbol(symbol, &self.config.market_suffix)
    }

    async fn call<T, F, Fut>(&self, symbol: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, yahoo::YahooError>>,
    {
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 0;
        loop {
            self.rate_limiter.until_ready().await;

            let err = match tokio::time::timeout(self.config.request_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => StockError::YahooFinanceError(e.to_string()),
                Err(_) => StockError::Timeout {
                    symbol: symbol.to_string(),
                    seconds: self.config.request_timeout.as_secs(),
                },
            };

            attempt += 1;
            if attempt >= attempts {
                return Err(err);
            }

            let delay = self.config.retry_backoff(attempt - 1);
            tracing::warn!(
                symbol,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Yahoo request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SeriesProvider for YahooFinanceClient {
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        if end < start {
            return Ok(PriceSeries::empty());
        }

        let ticker = self.market_symbol(symbol);
        let (from, to) = request_bounds(start, end, self.offset)?;
        tracing::debug!(ticker = %ticker, %start, %end, "Fetching quote history");

        let response = self
            .call(&ticker, || self.connector.get_quote_history(&ticker, from, to))
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let rows = quotes.iter().filter_map(|q| {
            if !q.close.is_finite() || q.close <= 0.0 {
                return None;
            }
            let date = session_date(q.timestamp as i64, self.offset)?;
            (start..=end).contains(&date).then_some((date, q.close))
        });

        Ok(PriceSeries::from_observations(rows))
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceClient {
    async fn latest_quote(&self, symbol: &str) -> Result<LiveQuote> {
        let ticker = self.market_symbol(symbol);
        let response = self
            .call(&ticker, || self.connector.get_latest_quotes(&ticker, "1d"))
            .await?;
        let quote = response
            .last_quote()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        Ok(LiveQuote {
            symbol: ticker,
            timestamp: DateTime::from_timestamp(quote.timestamp as i64, 0)
                .unwrap_or_else(Utc::now),
            price: quote.close,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            volume: quote.volume,
        })
    }
}

fn market_offset(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| StockError::ConfigError(format!("invalid UTC offset: {hours}")))
}

fn qualify_symbol(symbol: &str, suffix: &str) -> String {
    if symbol.contains('.') || suffix.is_empty() {
        symbol.to_string()
    } else {
        format!("{symbol}{suffix}")
    }
}

/// Market-local midnight of `start` up to midnight after `end`
fn request_bounds(
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let to_unix = |date: NaiveDate| -> Result<OffsetDateTime> {
        let midnight = offset
            .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
            .single()
            .ok_or_else(|| StockError::ConfigError(format!("ambiguous local time for {date}")))?;
        OffsetDateTime::from_unix_timestamp(midnight.timestamp())
            .map_err(|e| StockError::YahooFinanceError(format!("Invalid timestamp: {e}")))
    };

    let exclusive_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    Ok((to_unix(start)?, to_unix(exclusive_end)?))
}

/// Trading date of a quote timestamp in market-local time
fn session_date(timestamp: i64, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|t| t.with_timezone(&offset).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn taipei() -> FixedOffset {
        market_offset(8).unwrap()
    }

    #[test]
    fn test_qualify_symbol() {
        assert_eq!(qualify_symbol("2330", ".TW"), "2330.TW");
        assert_eq!(qualify_symbol("2330.TW", ".TW"), "2330.TW");
        assert_eq!(qualify_symbol("2330", ""), "2330");
    }

    #[test]
    fn test_request_bounds_cover_end_date() {
        let (from, to) = request_bounds(date(2023, 7, 3), date(2023, 7, 3), taipei()).unwrap();
        // 2023-07-03T00:00+08:00
        assert_eq!(from.unix_timestamp(), 1_688_313_600);
        assert_eq!(to.unix_timestamp() - from.unix_timestamp(), 86_400);
    }

    #[test]
    fn test_session_date_uses_market_time() {
        // 2023-07-02T17:00Z is already the morning of 07-03 in Taipei
        assert_eq!(session_date(1_688_317_200, taipei()), Some(date(2023, 7, 3)));
        let utc = market_offset(0).unwrap();
        assert_eq!(session_date(1_688_317_200, utc), Some(date(2023, 7, 2)));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_series() {
        let client = YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap();
        let series = client
            .fetch_series("2330.TW", date(2023, 7, 1), date(2023, 7, 31))
            .await
            .unwrap();
        assert!(!series.is_empty());
        assert!(series.first().unwrap().date >= date(2023, 7, 1));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_latest_quote() {
        let client = YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap();
        let quote = client.latest_quote("2330").await.unwrap();
        assert_eq!(quote.symbol, "2330.TW");
        assert!(quote.price > 0.0);
    }
}
