//! Time-bounded cache in front of a [`SeriesProvider`]

use crate::error::Result;
use crate::series::{PriceSeries, SeriesProvider};
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for a series request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
        }
    }
}

/// Thread-safe TTL cache of fetched series
pub struct SeriesCache {
    cache: Arc<RwLock<TimedCache<SeriesKey, PriceSeries>>>,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &SeriesKey) -> Option<PriceSeries> {
        // TimedCache evicts on read, so lookups need the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: SeriesKey, series: PriceSeries) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, series);
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for SeriesCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Wraps a provider so identical requests inside the TTL skip the network.
///
/// Only non-empty successful fetches are stored; errors and empty series
/// always go back to the inner provider next time.
pub struct CachedSeriesProvider<P> {
    inner: P,
    cache: SeriesCache,
}

impl<P: SeriesProvider> CachedSeriesProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: SeriesCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }
}

#[async_trait]
impl<P: SeriesProvider> SeriesProvider for CachedSeriesProvider<P> {
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let key = SeriesKey::new(symbol, start, end);
        if let Some(series) = self.cache.get(&key).await {
            tracing::debug!("Cache hit for key: {:?}", key);
            return Ok(series);
        }

        tracing::debug!("Cache miss for key: {:?}", key);
        let series = self.inner.fetch_series(symbol, start, end).await?;
        if !series.is_empty() {
            self.cache.insert(key, series.clone()).await;
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use crate::series::{MockSeriesProvider, PricePoint};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> PriceSeries {
        PriceSeries::new(vec![
            PricePoint::new(date(2023, 7, 3), 500.0),
            PricePoint::new(date(2023, 7, 4), 505.0),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let key = SeriesKey::new("2330.TW", date(2023, 7, 1), date(2023, 7, 31));

        cache.insert(key.clone(), sample()).await;
        assert_eq!(cache.get(&key).await, Some(sample()));
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_repeated_fetch_hits_cache() {
        let mut inner = MockSeriesProvider::new();
        inner
            .expect_fetch_series()
            .times(1)
            .returning(|_, _, _| Ok(sample()));

        let provider = CachedSeriesProvider::new(inner, Duration::from_secs(60));
        let start = date(2023, 7, 1);
        let end = date(2023, 7, 31);

        let first = provider.fetch_series("2330.TW", start, end).await.unwrap();
        let second = provider.fetch_series("2330.TW", start, end).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_errors_and_empty_series_are_not_cached() {
        let mut inner = MockSeriesProvider::new();
        let mut calls = 0;
        inner.expect_fetch_series().times(3).returning(move |_, _, _| {
            calls += 1;
            match calls {
                1 => Err(StockError::YahooFinanceError("boom".to_string())),
                2 => Ok(PriceSeries::empty()),
                _ => Ok(sample()),
            }
        });

        let provider = CachedSeriesProvider::new(inner, Duration::from_secs(60));
        let (start, end) = (date(2023, 7, 1), date(2023, 7, 31));

        assert!(provider.fetch_series("2330.TW", start, end).await.is_err());
        assert!(provider.fetch_series("2330.TW", start, end).await.unwrap().is_empty());
        assert_eq!(provider.fetch_series("2330.TW", start, end).await.unwrap().len(), 2);
        assert_eq!(provider.cache().len().await, 1);
    }
}
