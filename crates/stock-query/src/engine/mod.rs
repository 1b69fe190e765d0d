//! Query engine
//!
//! Pure analytics over price series plus the coordinator that resolves
//! symbols, fetches series and assembles per-instrument results.

pub mod analytics;
pub mod query;
pub mod query_engine;
pub mod result;

pub use analytics::{
    Deviation, Extremum, ExtremumMode, IntervalMean, PointValue, RollingMean, extremum,
    interval_mean, point_value, rolling_mean,
};
pub use query::Query;
pub use query_engine::QueryEngine;
pub use result::{Annotation, InstrumentResult, QueryResult, QueryValue, ResultEntry};
