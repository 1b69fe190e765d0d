//! Query engine - resolves symbols, fetches series and runs analytics

use super::analytics::{self, ExtremumMode};
use super::query::Query;
use super::result::{InstrumentResult, QueryResult, QueryValue, ResultEntry};
use crate::config::StockConfig;
use crate::dates::lookback_start;
use crate::error::QueryError;
use crate::series::{PricePoint, PriceSeries, SeriesProvider};
use crate::symbols::{Instrument, SymbolResolver};
use chrono::{Days, FixedOffset, NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extra calendar days fetched beyond `2n` for a rolling window
const ROLLING_SLACK_DAYS: u64 = 10;

/// Stock query engine
pub struct QueryEngine {
    provider: Arc<dyn SeriesProvider>,
    resolver: Arc<SymbolResolver>,
    config: Arc<StockConfig>,
    today: Option<NaiveDate>,
}

impl QueryEngine {
    pub fn new(
        provider: Arc<dyn SeriesProvider>,
        resolver: Arc<SymbolResolver>,
        config: Arc<StockConfig>,
    ) -> Self {
        Self {
            provider,
            resolver,
            config,
            today: None,
        }
    }

    /// Pin "today" instead of reading the clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Current date at the exchange
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| {
            let now = Utc::now();
            FixedOffset::east_opt(self.config.market_utc_offset_hours * 3600)
                .map_or_else(|| now.date_naive(), |offset| now.with_timezone(&offset).date_naive())
        })
    }

    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Run a query
    pub async fn execute(&self, query: &Query) -> QueryResult {
        debug!(query = query.description(), symbols = ?query.symbols(), "Executing query");

        match query {
            Query::Point { symbol, date } => QueryResult::single(self.point(symbol, *date).await),
            Query::IntervalAverage { symbol, start, end } => {
                QueryResult::single(self.interval_average(symbol, *start, *end).await)
            }
            Query::RollingAverage { symbol, window } => {
                QueryResult::single(self.rolling_average(symbol, *window).await)
            }
            Query::Extremum {
                symbol,
                mode,
                start,
                end,
            } => QueryResult::single(self.extremum(symbol, *mode, *start, *end).await),
            Query::BatchPoint { symbols, date } => self.batch_point(symbols, *date).await,
        }
    }

    /// Point lookup for each symbol; members fail independently, order is kept
    pub async fn batch_point(&self, symbols: &[String], date: NaiveDate) -> QueryResult {
        let entries = if self.config.parallel_batch {
            join_all(symbols.iter().map(|s| self.point(s, date))).await
        } else {
            let mut entries = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                entries.push(self.point(symbol, date).await);
            }
            entries
        };
        QueryResult::batch(entries)
    }

    /// Close on `date` or the latest earlier session
    pub async fn point(&self, token: &str, date: NaiveDate) -> ResultEntry {
        let lookback = self.config.lookback_days;
        let no_session = QueryError::NoEligibleSession {
            target: date,
            lookback_days: lookback,
        };
        let start = lookback_start(date, lookback);
        let outcome = self
            .evaluate(token, start, date, no_session, |series| {
                analytics::point_value(series, date, lookback).map(QueryValue::Point)
            })
            .await;
        ResultEntry::new(token, outcome)
    }

    /// Mean close over `[start, end]`
    pub async fn interval_average(
        &self,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEntry {
        if end < start {
            return ResultEntry::new(token, Err(QueryError::InvalidRange { start, end }));
        }
        let outcome = self
            .evaluate(token, start, end, QueryError::NoData, |series| {
                analytics::interval_mean(series, start, end).map(QueryValue::IntervalMean)
            })
            .await;
        ResultEntry::new(token, outcome)
    }

    /// Mean of the most recent `window` sessions
    pub async fn rolling_average(&self, token: &str, window: usize) -> ResultEntry {
        let (start, end) = self.recent_window(window);

        let outcome = self
            .evaluate(token, start, end, QueryError::NoData, |series| {
                analytics::rolling_mean(series, window).map(QueryValue::RollingMean)
            })
            .await;
        ResultEntry::new(token, outcome)
    }

    /// Highest or lowest close over `[start, end]`
    pub async fn extremum(
        &self,
        token: &str,
        mode: ExtremumMode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEntry {
        if end < start {
            return ResultEntry::new(token, Err(QueryError::InvalidRange { start, end }));
        }
        let outcome = self
            .evaluate(token, start, end, QueryError::NoData, |series| {
                analytics::extremum(series, start, end, mode).map(QueryValue::Extremum)
            })
            .await;
        ResultEntry::new(token, outcome)
    }

    /// The last `count` sessions up to today, newest first
    pub async fn recent_sessions(&self, instrument: &Instrument, count: usize) -> Vec<PricePoint> {
        let (start, end) = self.recent_window(count);

        match self.fetch(instrument, start, end).await {
            Ok(series) => series.tail(count).iter().rev().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Calendar range wide enough to hold `sessions` trading days ending today
    fn recent_window(&self, sessions: usize) -> (NaiveDate, NaiveDate) {
        let end = self.today();
        let span = (sessions as u64)
            .saturating_mul(2)
            .saturating_add(ROLLING_SLACK_DAYS);
        let start = end
            .checked_sub_days(Days::new(span))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    fn resolve(&self, token: &str) -> Result<Arc<Instrument>, QueryError> {
        self.resolver
            .resolve(token)
            .ok_or_else(|| QueryError::UnresolvedSymbol(token.to_string()))
    }

    /// Resolve, fetch `[start, end]` and apply `compute`.
    ///
    /// A provider failure is `NoData`; an empty window is reported as `empty`.
    async fn evaluate<F>(
        &self,
        token: &str,
        start: NaiveDate,
        end: NaiveDate,
        empty: QueryError,
        compute: F,
    ) -> Result<InstrumentResult, QueryError>
    where
        F: FnOnce(&PriceSeries) -> Result<QueryValue, QueryError>,
    {
        let instrument = self.resolve(token)?;
        let series = self.fetch(&instrument, start, end).await?;
        if series.is_empty() {
            debug!(symbol = %instrument.symbol, %start, %end, "Empty series");
            return Err(empty);
        }
        let value = compute(&series)?;
        Ok(InstrumentResult::new(instrument, value))
    }

    /// Single fetch, no retry; provider errors become `NoData`
    async fn fetch(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, QueryError> {
        self.provider
            .fetch_series(&instrument.symbol, start, end)
            .await
            .map_err(|e| {
                warn!(symbol = %instrument.symbol, %start, %end, error = %e, "Series unavailable");
                QueryError::NoData
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::analytics::Deviation;
    use crate::error::StockError;
    use crate::series::{InMemorySeriesProvider, MockSeriesProvider, PricePoint};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(rows: &[((i32, u32, u32), f64)]) -> PriceSeries {
        PriceSeries::new(
            rows.iter()
                .map(|((y, m, d), c)| PricePoint::new(date(*y, *m, *d), *c))
                .collect(),
        )
        .unwrap()
    }

    fn engine_with(provider: impl SeriesProvider + 'static, config: StockConfig) -> QueryEngine {
        QueryEngine::new(
            Arc::new(provider),
            Arc::new(SymbolResolver::with_builtin().unwrap()),
            Arc::new(config),
        )
        .with_today(date(2023, 1, 5))
    }

    fn engine() -> QueryEngine {
        let provider = InMemorySeriesProvider::new()
            .with_series(
                "2330.TW",
                series(&[
                    ((2023, 1, 3), 100.0),
                    ((2023, 1, 4), 110.0),
                    ((2023, 1, 5), 90.0),
                ]),
            )
            .with_series(
                "2454.TW",
                series(&[((2022, 12, 30), 700.0), ((2023, 1, 3), 710.0)]),
            );
        engine_with(provider, StockConfig::default())
    }

    fn value(entry: &ResultEntry) -> &QueryValue {
        &entry.outcome.as_ref().unwrap().value
    }

    #[tokio::test]
    async fn test_point_query() {
        let result = engine()
            .execute(&Query::Point {
                symbol: "台積電".to_string(),
                date: date(2023, 1, 4),
            })
            .await;
        assert!(!result.batch);
        let entry = &result.entries[0];
        assert_eq!(entry.outcome.as_ref().unwrap().instrument.symbol, "2330.TW");
        match value(entry) {
            QueryValue::Point(p) => assert_eq!(p.close, 110.0),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_point_query_weekend_is_annotated() {
        let result = engine()
            .execute(&Query::Point {
                symbol: "聯發科".to_string(),
                date: date(2023, 1, 1),
            })
            .await;
        let found = result.entries[0].outcome.as_ref().unwrap();
        assert!(found.annotation.is_some());
        match &found.value {
            QueryValue::Point(p) => {
                assert_eq!(p.effective, date(2022, 12, 30));
                assert_eq!(p.close, 700.0);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interval_average() {
        let result = engine()
            .execute(&Query::IntervalAverage {
                symbol: "tsmc".to_string(),
                start: date(2023, 1, 1),
                end: date(2023, 1, 31),
            })
            .await;
        match value(&result.entries[0]) {
            QueryValue::IntervalMean(m) => {
                assert_eq!(m.mean, 100.0);
                assert_eq!(m.sample_count, 3);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interval_average_inverted_range() {
        let entry = engine()
            .interval_average("台積電", date(2023, 6, 30), date(2023, 1, 1))
            .await;
        assert!(matches!(entry.outcome, Err(QueryError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn test_rolling_average() {
        let result = engine()
            .execute(&Query::RollingAverage {
                symbol: "2330".to_string(),
                window: 2,
            })
            .await;
        match value(&result.entries[0]) {
            QueryValue::RollingMean(r) => {
                assert_eq!(r.mean, 100.0);
                assert_eq!(r.latest_close, 90.0);
                assert_eq!(r.deviation, Deviation::Below(10.0));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rolling_average_insufficient() {
        let entry = engine().rolling_average("台積電", 10).await;
        assert_eq!(
            entry.outcome.unwrap_err(),
            QueryError::InsufficientData {
                requested: 10,
                available: 3
            }
        );
    }

    #[tokio::test]
    async fn test_extremum() {
        let entry = engine()
            .extremum("台積電", ExtremumMode::Min, date(2023, 1, 1), date(2023, 12, 31))
            .await;
        match value(&entry) {
            QueryValue::Extremum(e) => {
                assert_eq!(e.value, 90.0);
                assert_eq!(e.date, date(2023, 1, 5));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let symbols = vec![
            "台積電".to_string(),
            "不存在".to_string(),
            "聯發科".to_string(),
        ];
        let result = engine().batch_point(&symbols, date(2023, 1, 3)).await;
        assert!(result.batch);
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.entries[0].label, "台積電");
        assert!(result.entries[0].is_ok());
        assert_eq!(
            result.entries[1].outcome,
            Err(QueryError::UnresolvedSymbol("不存在".to_string()))
        );
        assert_eq!(result.entries[2].label, "聯發科");
        assert!(result.entries[2].is_ok());
    }

    #[tokio::test]
    async fn test_parallel_batch_keeps_order() {
        let provider = InMemorySeriesProvider::new()
            .with_series("2330.TW", series(&[((2023, 1, 3), 100.0)]))
            .with_series("2454.TW", series(&[((2023, 1, 3), 710.0)]));
        let config = StockConfig::builder().parallel_batch(true).build().unwrap();
        let engine = engine_with(provider, config);

        let symbols = vec!["聯發科".to_string(), "鴻海".to_string(), "台積電".to_string()];
        let result = engine.batch_point(&symbols, date(2023, 1, 3)).await;
        let labels: Vec<&str> = result.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["聯發科", "鴻海", "台積電"]);
        assert_eq!(result.entries[1].outcome, Err(QueryError::NoData));
    }

    #[tokio::test]
    async fn test_provider_failure_is_no_data_without_retry() {
        let mut provider = MockSeriesProvider::new();
        provider
            .expect_fetch_series()
            .times(1)
            .returning(|symbol, _, _| {
                Err(StockError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "connection reset".to_string(),
                })
            });
        let entry = engine_with(provider, StockConfig::default())
            .point("台積電", date(2023, 7, 3))
            .await;
        assert_eq!(entry.outcome, Err(QueryError::NoData));
    }

    #[tokio::test]
    async fn test_point_fetch_window_covers_lookback() {
        let mut provider = MockSeriesProvider::new();
        provider
            .expect_fetch_series()
            .withf(|symbol, start, end| {
                symbol == "2330.TW"
                    && *start == NaiveDate::from_ymd_opt(2023, 6, 6).unwrap()
                    && *end == NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()
            })
            .times(1)
            .returning(|_, _, _| Ok(PriceSeries::empty()));
        let entry = engine_with(provider, StockConfig::default())
            .point("台積電", date(2023, 7, 1))
            .await;
        assert_eq!(
            entry.outcome,
            Err(QueryError::NoEligibleSession {
                target: date(2023, 7, 1),
                lookback_days: 25
            })
        );
    }

    #[tokio::test]
    async fn test_point_before_first_session_has_no_eligible_session() {
        let provider = InMemorySeriesProvider::new().with_series(
            "2330.TW",
            series(&[((2023, 7, 3), 500.0), ((2023, 7, 4), 505.0)]),
        );
        let engine = engine_with(provider, StockConfig::default());

        let entry = engine.point("台積電", date(2023, 7, 1)).await;
        assert_eq!(
            entry.outcome,
            Err(QueryError::NoEligibleSession {
                target: date(2023, 7, 1),
                lookback_days: 25
            })
        );

        let symbols = vec!["台積電".to_string()];
        let batch = engine.batch_point(&symbols, date(2023, 7, 1)).await;
        assert!(matches!(
            batch.entries[0].outcome,
            Err(QueryError::NoEligibleSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_range_is_no_data() {
        let provider = InMemorySeriesProvider::new().with_series(
            "2330.TW",
            series(&[((2023, 7, 3), 500.0)]),
        );
        let entry = engine_with(provider, StockConfig::default())
            .interval_average("台積電", date(2023, 1, 1), date(2023, 1, 31))
            .await;
        assert_eq!(entry.outcome, Err(QueryError::NoData));
    }

    #[tokio::test]
    async fn test_unresolved_symbol_skips_fetch() {
        let mut provider = MockSeriesProvider::new();
        provider.expect_fetch_series().times(0);
        let entry = engine_with(provider, StockConfig::default())
            .point("hello", date(2023, 7, 1))
            .await;
        assert_eq!(
            entry.outcome,
            Err(QueryError::UnresolvedSymbol("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_recent_sessions_newest_first() {
        let engine = engine();
        let tsmc = engine.resolver().resolve("台積電").unwrap();
        let recent = engine.recent_sessions(&tsmc, 5).await;
        let closes: Vec<f64> = recent.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![90.0, 110.0, 100.0]);
    }
}
