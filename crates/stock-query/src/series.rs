//! Daily close-price series and the data source contracts

use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One trading session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Date-ordered close prices for one instrument.
///
/// Dates are strictly increasing; non-trading days are absent. An empty
/// series is a valid "no data" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build from points that already satisfy the ordering invariant
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        if let Some(pair) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(StockError::InvalidSeries(format!(
                "dates not strictly increasing: {} then {}",
                pair[0].date, pair[1].date
            )));
        }
        Ok(Self { points })
    }

    /// Normalize raw provider rows: sort by date, keep the last row per date
    pub fn from_observations(rows: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> = rows.into_iter().collect();
        Self {
            points: by_date
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Close on an exact session date
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by(|p| p.date.cmp(&date))
            .ok()
            .map(|idx| self.points[idx].close)
    }

    /// Sessions with `start <= date <= end`
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> &[PricePoint] {
        if end < start {
            return &[];
        }
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        &self.points[lo..hi]
    }

    /// The most recent `n` sessions in chronological order
    pub fn tail(&self, n: usize) -> &[PricePoint] {
        &self.points[self.points.len().saturating_sub(n)..]
    }
}

/// Source of daily close prices.
///
/// `end` is inclusive. Network failure, an unknown symbol and an empty result
/// are all reported either as `Err` or as an empty series; callers treat both
/// as "no data".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries>;
}

/// Latest trade snapshot from the real-time source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

/// Real-time last-trade lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn latest_quote(&self, symbol: &str) -> Result<LiveQuote>;
}

/// Fixed series per symbol, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct InMemorySeriesProvider {
    series: HashMap<String, PriceSeries>,
}

impl InMemorySeriesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series for `symbol`
    pub fn with_series(mut self, symbol: impl Into<String>, series: PriceSeries) -> Self {
        self.series.insert(symbol.into(), series);
        self
    }
}

#[async_trait]
impl SeriesProvider for InMemorySeriesProvider {
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "unknown symbol".to_string(),
            })?;
        Ok(PriceSeries {
            points: series.range(start, end).to_vec(),
        })
    }
}
