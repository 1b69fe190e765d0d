//! Pure computations over a [`PriceSeries`]
//!
//! Nothing here fetches data or touches shared state; the same series and
//! arguments always give the same answer.

use crate::dates::effective_session;
use crate::error::QueryError;
use crate::series::{PricePoint, PriceSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Below this magnitude the latest close counts as equal to the mean
const DEVIATION_EPSILON: f64 = 0.005;

/// Which extremum to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtremumMode {
    Max,
    Min,
}

impl fmt::Display for ExtremumMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtremumMode::Max => f.write_str("最高"),
            ExtremumMode::Min => f.write_str("最低"),
        }
    }
}

/// Close used to answer a point lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointValue {
    pub requested: NaiveDate,
    pub effective: NaiveDate,
    pub close: f64,
}

impl PointValue {
    /// The requested day had no session and an earlier one was used
    pub fn is_substituted(&self) -> bool {
        self.requested != self.effective
    }
}

/// Arithmetic mean over a date range, with its sample size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalMean {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub mean: f64,
    pub sample_count: usize,
}

/// Position of the latest close relative to a mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Deviation {
    /// Latest close above the mean by this amount
    Above(f64),
    /// Latest close below the mean by this amount
    Below(f64),
    AtAverage,
}

impl Deviation {
    /// Classify `latest - mean`
    pub fn between(latest: f64, mean: f64) -> Self {
        let diff = latest - mean;
        if diff.abs() < DEVIATION_EPSILON {
            Deviation::AtAverage
        } else if diff > 0.0 {
            Deviation::Above(diff)
        } else {
            Deviation::Below(-diff)
        }
    }

    /// Signed `latest - mean`
    pub fn signed(&self) -> f64 {
        match self {
            Deviation::Above(v) => *v,
            Deviation::Below(v) => -*v,
            Deviation::AtAverage => 0.0,
        }
    }
}

/// Mean of the most recent `window` sessions plus the latest close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingMean {
    pub window: usize,
    pub mean: f64,
    pub latest_close: f64,
    pub latest_date: NaiveDate,
    pub first_date: NaiveDate,
    pub deviation: Deviation,
}

/// Highest or lowest close in a range and the session it occurred on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub mode: ExtremumMode,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub value: f64,
    pub date: NaiveDate,
}

/// Close on `target`, or on the latest earlier session within the look-back bound
pub fn point_value(
    series: &PriceSeries,
    target: NaiveDate,
    lookback_days: u32,
) -> Result<PointValue, QueryError> {
    let sessions = series.dates();
    let effective = effective_session(&sessions, target, lookback_days).ok_or(
        QueryError::NoEligibleSession {
            target,
            lookback_days,
        },
    )?;
    let close = series
        .close_on(effective)
        .ok_or(QueryError::NoEligibleSession {
            target,
            lookback_days,
        })?;

    Ok(PointValue {
        requested: target,
        effective,
        close,
    })
}

/// Mean close over `[start, end]`
pub fn interval_mean(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<IntervalMean, QueryError> {
    let window = series.range(start, end);
    if window.is_empty() {
        return Err(QueryError::NoData);
    }

    let sum: f64 = window.iter().map(|p| p.close).sum();
    Ok(IntervalMean {
        start,
        end,
        mean: sum / window.len() as f64,
        sample_count: window.len(),
    })
}

/// Mean of the last `n` sessions.
///
/// Fewer than `n` sessions is reported with the count that does exist; a
/// partial mean is never produced.
pub fn rolling_mean(series: &PriceSeries, n: usize) -> Result<RollingMean, QueryError> {
    if n == 0 || series.len() < n {
        return Err(QueryError::InsufficientData {
            requested: n,
            available: series.len(),
        });
    }

    let window = series.tail(n);
    let mut sma = SimpleMovingAverage::new(n).map_err(|e| {
        tracing::debug!(window = n, error = ?e, "SMA rejected window");
        QueryError::InsufficientData {
            requested: n,
            available: series.len(),
        }
    })?;
    let mean = window.iter().fold(0.0, |_, p| sma.next(p.close));

    let (first, latest) = match (window.first(), window.last()) {
        (Some(first), Some(latest)) => (first, latest),
        _ => return Err(QueryError::NoData),
    };

    Ok(RollingMean {
        window: n,
        mean,
        latest_close: latest.close,
        latest_date: latest.date,
        first_date: first.date,
        deviation: Deviation::between(latest.close, mean),
    })
}

/// Highest or lowest close in `[start, end]`; ties resolve to the earliest date
pub fn extremum(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
    mode: ExtremumMode,
) -> Result<Extremum, QueryError> {
    let better = |candidate: &PricePoint, best: &PricePoint| match mode {
        ExtremumMode::Max => candidate.close > best.close,
        ExtremumMode::Min => candidate.close < best.close,
    };

    let best = series
        .range(start, end)
        .iter()
        .fold(None::<&PricePoint>, |best, p| match best {
            Some(b) if !better(p, b) => Some(b),
            _ => Some(p),
        })
        .ok_or(QueryError::NoData)?;

    Ok(Extremum {
        mode,
        start,
        end,
        value: best.close,
        date: best.date,
    })
}
