//! Strict date parsing and trading-day fallback

use chrono::{Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static DATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid regex")
});

static DATE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)([0-9]{4}-[0-9]{2}-[0-9]{2})$").expect("valid regex")
});

static ROLLING_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^最近(-?[0-9]+)天$").expect("valid regex")
});

static ROLLING_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(最近-?[0-9]+天)$").expect("valid regex")
});

/// Outcome of reading a token as a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    /// A valid `YYYY-MM-DD` date
    Date(NaiveDate),
    /// `YYYY-MM-DD` shape but not a calendar date (`2023-02-30`)
    Invalid,
    /// Not a date at all
    NotADate,
}

impl DateToken {
    /// Token occupies a date position, valid or not
    pub fn is_date_shaped(self) -> bool {
        !matches!(self, DateToken::NotADate)
    }
}

/// Classify a token against the strict `YYYY-MM-DD` format
pub fn classify_date(token: &str) -> DateToken {
    if !DATE_SHAPE.is_match(token) {
        return DateToken::NotADate;
    }
    match NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        Ok(date) => DateToken::Date(date),
        Err(_) => DateToken::Invalid,
    }
}

/// Parse a strict `YYYY-MM-DD` date; every other shape is `None`
pub fn parse_strict_date(token: &str) -> Option<NaiveDate> {
    match classify_date(token) {
        DateToken::Date(date) => Some(date),
        _ => None,
    }
}

/// Parse `最近<N>天`, the most recent N trading sessions.
///
/// Zero and negative counts are not windows.
pub fn parse_rolling_window_token(token: &str) -> Option<usize> {
    let caps = ROLLING_WINDOW.captures(token)?;
    let count: i64 = caps.get(1)?.as_str().parse().ok()?;
    usize::try_from(count).ok().filter(|n| *n > 0)
}

/// Split `台積電2023-07-01` into name and date literal
pub fn split_date_suffix(token: &str) -> Option<(&str, &str)> {
    let caps = DATE_SUFFIX.captures(token)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Split `台積電最近10天` into name and window token
pub fn split_rolling_suffix(token: &str) -> Option<(&str, &str)> {
    let caps = ROLLING_SUFFIX.captures(token)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// First calendar day still inside the look-back bound of `target`
pub fn lookback_start(target: NaiveDate, lookback_days: u32) -> NaiveDate {
    target
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Latest session on or before `target`, if it lies within the look-back bound
pub fn effective_session(
    sessions: &[NaiveDate],
    target: NaiveDate,
    lookback_days: u32,
) -> Option<NaiveDate> {
    let idx = sessions.partition_point(|d| *d <= target);
    let candidate = *sessions.get(idx.checked_sub(1)?)?;
    (candidate >= lookback_start(target, lookback_days)).then_some(candidate)
}
