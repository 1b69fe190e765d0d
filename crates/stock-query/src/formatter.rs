//! Reply text rendering

use crate::engine::{Deviation, InstrumentResult, QueryResult, QueryValue, ResultEntry};
use crate::error::QueryError;
use crate::series::{LiveQuote, PricePoint};
use chrono::{FixedOffset, Offset, Utc};

pub trait Formatter: Send + Sync {
    fn format_result(&self, result: &QueryResult) -> String;
    fn format_error(&self, error: &QueryError) -> String;
    fn format_live_quote(&self, title: &str, quote: &LiveQuote, recent: &[PricePoint]) -> String;
    fn format_help(&self) -> String;
}

/// Plain-text replies for chat and terminal
pub struct TextFormatter {
    offset: FixedOffset,
}

impl TextFormatter {
    /// Quote times are shown at `offset`
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Formatter for a market `utc_offset_hours` east of UTC
    pub fn for_market(utc_offset_hours: i32) -> Self {
        Self::new(FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or(Utc.fix()))
    }

    fn format_entry(&self, entry: &ResultEntry) -> String {
        match &entry.outcome {
            Ok(result) => Self::format_value(result),
            Err(error) => format!("{}: {}", entry.label, self.format_error(error)),
        }
    }

    fn format_value(result: &InstrumentResult) -> String {
        let instrument = &result.instrument;
        let mut line = match &result.value {
            QueryValue::Point(point) => {
                format!("{instrument} {} 收盤價: {:.2}", point.requested, point.close)
            }
            QueryValue::IntervalMean(mean) => format!(
                "{instrument} {} ~ {} 平均收盤價: {:.2} (共 {} 個交易日)",
                mean.start, mean.end, mean.mean, mean.sample_count
            ),
            QueryValue::RollingMean(rolling) => {
                let position = match rolling.deviation {
                    Deviation::Above(diff) => format!("高於平均 {diff:.2}"),
                    Deviation::Below(diff) => format!("低於平均 {diff:.2}"),
                    Deviation::AtAverage => "等於平均".to_string(),
                };
                format!(
                    "{instrument} 最近{}天平均: {:.2} ({} ~ {})\n最新收盤 {}: {:.2}，{position}",
                    rolling.window,
                    rolling.mean,
                    rolling.first_date,
                    rolling.latest_date,
                    rolling.latest_date,
                    rolling.latest_close,
                )
            }
            QueryValue::Extremum(extremum) => format!(
                "{instrument} {} ~ {} {}收盤價: {:.2} ({})",
                extremum.start, extremum.end, extremum.mode, extremum.value, extremum.date
            ),
        };

        if let Some(annotation) = &result.annotation {
            line.push_str(&format!(" ({annotation})"));
        }
        line
    }
}

impl Formatter for TextFormatter {
    fn format_result(&self, result: &QueryResult) -> String {
        result
            .entries
            .iter()
            .map(|entry| self.format_entry(entry))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_error(&self, error: &QueryError) -> String {
        match error {
            QueryError::UnresolvedSymbol(_) => "查無此股票".to_string(),
            QueryError::InvalidDate(literal) => {
                format!("日期格式錯誤: {literal}，請使用 YYYY-MM-DD")
            }
            QueryError::InvalidRange { start, end } => {
                format!("起日 {start} 晚於迄日 {end}")
            }
            QueryError::NoEligibleSession {
                target,
                lookback_days,
            } => format!("{target} 前 {lookback_days} 天內沒有交易日資料"),
            QueryError::NoData => "查無資料".to_string(),
            QueryError::InsufficientData {
                requested,
                available,
            } => format!("資料不足: 需要 {requested} 個交易日，僅有 {available} 個"),
        }
    }

    fn format_live_quote(&self, title: &str, quote: &LiveQuote, recent: &[PricePoint]) -> String {
        let time = quote.timestamp.with_timezone(&self.offset).format("%H:%M:%S");
        let mut lines = vec![
            format!("{title} {time}"),
            format!("現價: {:.2} / 開盤: {:.2}", quote.price, quote.open),
            format!("最高: {:.2} / 最低: {:.2}", quote.high, quote.low),
            format!("量: {}", quote.volume),
        ];

        if !recent.is_empty() {
            lines.push("-----".to_string());
            lines.push("最近五日價格:".to_string());
            lines.extend(
                recent
                    .iter()
                    .map(|p| format!("[{}] {:.2}", p.date, p.close)),
            );
        }
        lines.join("\n")
    }

    fn format_help(&self) -> String {
        crate::bot::Command::help_text().trim().to_string()
    }
}
