//! Validated query variants produced by the command parser

use super::analytics::ExtremumMode;
use chrono::NaiveDate;

/// A recognized request, arguments already validated.
///
/// Symbols are kept as typed; resolution happens in the engine so that a
/// batch can report each unresolved member on its own line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Close on a date, falling back to the previous session
    Point { symbol: String, date: NaiveDate },
    /// Mean close over an inclusive range
    IntervalAverage {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Mean of the most recent `window` sessions
    RollingAverage { symbol: String, window: usize },
    /// Highest or lowest close over an inclusive range
    Extremum {
        symbol: String,
        mode: ExtremumMode,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Point lookup for several symbols on one date
    BatchPoint {
        symbols: Vec<String>,
        date: NaiveDate,
    },
}

impl Query {
    /// Symbols referenced by the query, in input order
    pub fn symbols(&self) -> Vec<&str> {
        match self {
            Query::Point { symbol, .. }
            | Query::IntervalAverage { symbol, .. }
            | Query::RollingAverage { symbol, .. }
            | Query::Extremum { symbol, .. } => vec![symbol.as_str()],
            Query::BatchPoint { symbols, .. } => symbols.iter().map(String::as_str).collect(),
        }
    }

    /// Short description used in logs
    pub fn description(&self) -> &'static str {
        match self {
            Query::Point { .. } => "Point lookup",
            Query::IntervalAverage { .. } => "Interval average",
            Query::RollingAverage { .. } => "Rolling average",
            Query::Extremum { .. } => "Period extremum",
            Query::BatchPoint { .. } => "Batch point lookup",
        }
    }
}
