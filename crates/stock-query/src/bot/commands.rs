//! Command parsing for the stock query bot
//!
//! Input is split on whitespace and matched against a fixed, priority-ordered
//! set of shapes. Anything that matches none of them is [`Command::Unparsed`]
//! and goes to the fallback responder.

use crate::config::StockConfig;
use crate::dates::{
    DateToken, classify_date, parse_rolling_window_token, split_date_suffix, split_rolling_suffix,
};
use crate::engine::{ExtremumMode, Query};
use crate::error::QueryError;
use crate::symbols::{Instrument, SymbolResolver};
use chrono::NaiveDate;
use std::sync::Arc;

const HELP_KEYWORDS: &[&str] = &["幫助", "help", "選單", "menu", "?", "？"];
const AVERAGE_KEYWORD: &str = "平均";
const MAX_KEYWORD: &str = "最高";
const MIN_KEYWORD: &str = "最低";

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the command list
    Help,
    /// Real-time quote; `instrument` is set when the code or name is known
    LivePrice {
        code: String,
        instrument: Option<Arc<Instrument>>,
    },
    /// Historical query for the engine
    Query(Query),
    /// Recognized shape with a bad argument
    Invalid(QueryError),
    /// Free text nobody claimed
    Unparsed { text: String },
}

impl Command {
    /// Short description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Command::Help => "Show help",
            Command::LivePrice { .. } => "Live price",
            Command::Query(query) => query.description(),
            Command::Invalid(_) => "Invalid arguments",
            Command::Unparsed { .. } => "Free text",
        }
    }

    /// Get help text for all commands
    pub fn help_text() -> &'static str {
        r"
台股查詢指令
============================

即時報價:
  <代號>                      例: 2330
  <名稱>                      例: 台積電

歷史收盤價:
  <名稱> <YYYY-MM-DD>         例: 台積電 2023-07-03
  <名稱1> <名稱2> ... <YYYY-MM-DD>
                              多檔同日收盤價

區間平均:
  <名稱> 平均                 預設區間平均收盤價
  <名稱> 平均 <起日> <迄日>   例: 台積電 平均 2023-01-01 2023-06-30

移動平均:
  <名稱> 最近<N>天            例: 台積電 最近10天

區間最高/最低:
  <名稱> 最高
  <名稱> 最低

名稱與參數之間的空白可省略，例: 台積電2023-07-03、台積電平均
日期若非交易日，將以前一個交易日的收盤價替代。

其他:
  幫助 / help / 選單 / ?      顯示本說明
"
    }
}

/// Turns raw text into a [`Command`]
pub struct CommandParser {
    resolver: Arc<SymbolResolver>,
    default_start: NaiveDate,
    default_end: NaiveDate,
}

impl CommandParser {
    pub fn new(resolver: Arc<SymbolResolver>, config: &StockConfig) -> Self {
        Self {
            resolver,
            default_start: config.default_range_start,
            default_end: config.default_range_end,
        }
    }

    /// Parse one line of input
    pub fn parse(&self, input: &str) -> Command {
        let text = input.trim();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let command = match tokens.as_slice() {
            [] => None,
            [token] => self.parse_single(token),
            [symbol, arg] => self.parse_pair(symbol, arg),
            [symbol, keyword, start, end] if *keyword == AVERAGE_KEYWORD => {
                Some(self.explicit_average(symbol, start, end))
            }
            [leading @ .., last] => Self::parse_batch(leading, last),
        };

        let command = command.unwrap_or_else(|| Command::Unparsed {
            text: text.to_string(),
        });
        tracing::debug!(input = text, command = command.description(), "Parsed input");
        command
    }

    fn parse_single(&self, token: &str) -> Option<Command> {
        if is_help_keyword(token) {
            return Some(Command::Help);
        }

        if token.chars().all(|c| c.is_ascii_digit()) {
            return Some(Command::LivePrice {
                code: token.to_string(),
                instrument: self.resolver.resolve(token),
            });
        }

        self.parse_fused(token).or_else(|| {
            self.resolver
                .resolve(token)
                .map(|instrument| Command::LivePrice {
                    code: instrument.code().to_string(),
                    instrument: Some(instrument),
                })
        })
    }

    /// `台積電2023-07-03`, `台積電平均`, `台積電最高`, `台積電最近10天`
    fn parse_fused(&self, token: &str) -> Option<Command> {
        if self.resolver.contains(token) {
            return None;
        }

        if let Some((name, date)) = split_date_suffix(token) {
            if self.resolver.contains(name) {
                return self.parse_pair(name, date);
            }
        }
        if let Some((name, window)) = split_rolling_suffix(token) {
            if self.resolver.contains(name) {
                return self.parse_pair(name, window);
            }
        }
        [AVERAGE_KEYWORD, MAX_KEYWORD, MIN_KEYWORD]
            .iter()
            .find_map(|keyword| {
                token
                    .strip_suffix(keyword)
                    .filter(|name| self.resolver.contains(name))
                    .map(|name| (name, *keyword))
            })
            .and_then(|(name, keyword)| self.parse_pair(name, keyword))
    }

    fn parse_pair(&self, symbol: &str, arg: &str) -> Option<Command> {
        let symbol = symbol.to_string();

        match classify_date(arg) {
            DateToken::Date(date) => return Some(Command::Query(Query::Point { symbol, date })),
            DateToken::Invalid => {
                return Some(Command::Invalid(QueryError::InvalidDate(arg.to_string())));
            }
            DateToken::NotADate => {}
        }

        let query = match arg {
            AVERAGE_KEYWORD => Query::IntervalAverage {
                symbol,
                start: self.default_start,
                end: self.default_end,
            },
            MAX_KEYWORD | MIN_KEYWORD => Query::Extremum {
                symbol,
                mode: if arg == MAX_KEYWORD {
                    ExtremumMode::Max
                } else {
                    ExtremumMode::Min
                },
                start: self.default_start,
                end: self.default_end,
            },
            _ => Query::RollingAverage {
                symbol,
                window: parse_rolling_window_token(arg)?,
            },
        };
        Some(Command::Query(query))
    }

    fn explicit_average(&self, symbol: &str, start: &str, end: &str) -> Command {
        let (start, end) = match (classify_date(start), classify_date(end)) {
            (DateToken::Date(start), DateToken::Date(end)) => (start, end),
            (DateToken::Date(_), _) => return Command::Invalid(QueryError::InvalidDate(end.to_string())),
            _ => return Command::Invalid(QueryError::InvalidDate(start.to_string())),
        };
        if end < start {
            return Command::Invalid(QueryError::InvalidRange { start, end });
        }
        Command::Query(Query::IntervalAverage {
            symbol: symbol.to_string(),
            start,
            end,
        })
    }

    /// Two or more names followed by one date
    fn parse_batch(leading: &[&str], last: &str) -> Option<Command> {
        let claimable = leading.iter().all(|token| {
            !matches!(*token, AVERAGE_KEYWORD | MAX_KEYWORD | MIN_KEYWORD)
                && !classify_date(token).is_date_shaped()
        });
        if !claimable {
            return None;
        }

        match classify_date(last) {
            DateToken::Date(date) => Some(Command::Query(Query::BatchPoint {
                symbols: leading.iter().map(ToString::to_string).collect(),
                date,
            })),
            DateToken::Invalid => Some(Command::Invalid(QueryError::InvalidDate(last.to_string()))),
            DateToken::NotADate => None,
        }
    }
}

fn is_help_keyword(token: &str) -> bool {
    HELP_KEYWORDS
        .iter()
        .any(|keyword| token.eq_ignore_ascii_case(keyword))
}
