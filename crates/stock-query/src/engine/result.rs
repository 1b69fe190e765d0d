//! Query result types

use super::analytics::{Extremum, IntervalMean, PointValue, RollingMean};
use crate::error::QueryError;
use crate::symbols::Instrument;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

/// Computed value for one instrument
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Point(PointValue),
    IntervalMean(IntervalMean),
    RollingMean(RollingMean),
    Extremum(Extremum),
}

/// Human-readable note attached to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Requested day had no session; an earlier session answered instead
    DateSubstituted {
        requested: NaiveDate,
        effective: NaiveDate,
    },
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::DateSubstituted {
                requested,
                effective,
            } => write!(f, "{requested} 非交易日，以 {effective} 替代"),
        }
    }
}

/// Successful answer for one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentResult {
    pub instrument: Arc<Instrument>,
    pub value: QueryValue,
    pub annotation: Option<Annotation>,
}

impl InstrumentResult {
    pub fn new(instrument: Arc<Instrument>, value: QueryValue) -> Self {
        let annotation = match &value {
            QueryValue::Point(point) if point.is_substituted() => {
                Some(Annotation::DateSubstituted {
                    requested: point.requested,
                    effective: point.effective,
                })
            }
            _ => None,
        };
        Self {
            instrument,
            value,
            annotation,
        }
    }
}

/// One line of a reply: the token as typed and what it produced
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub label: String,
    pub outcome: Result<InstrumentResult, QueryError>,
}

impl ResultEntry {
    pub fn new(label: impl Into<String>, outcome: Result<InstrumentResult, QueryError>) -> Self {
        Self {
            label: label.into(),
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Answer to a query: one entry, or one per batch member in input order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub entries: Vec<ResultEntry>,
    pub batch: bool,
}

impl QueryResult {
    pub fn single(entry: ResultEntry) -> Self {
        Self {
            entries: vec![entry],
            batch: false,
        }
    }

    pub fn batch(entries: Vec<ResultEntry>) -> Self {
        Self {
            entries,
            batch: true,
        }
    }

    /// Every entry produced a value
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(ResultEntry::is_ok)
    }

    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().filter(|e| e.is_ok()).count() as f64 / self.entries.len() as f64
    }

    /// Outcome of the first entry, for single queries
    pub fn first(&self) -> Option<&Result<InstrumentResult, QueryError>> {
        self.entries.first().map(|e| &e.outcome)
    }
}
