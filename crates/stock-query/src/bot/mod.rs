//! Taiwan stock query bot
//!
//! One line of text in, one formatted reply out. Commands are parsed by
//! [`CommandParser`], historical queries run on the [`QueryEngine`], live
//! quotes go to an optional [`QuoteProvider`] and everything else goes to the
//! [`FallbackResponder`].
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_query::bot::{BotConfig, StockBot};
//!
//! let bot = StockBot::new(BotConfig::default(), provider, resolver);
//! let reply = bot.process_input("台積電 2023-07-03").await?;
//! println!("{}", reply.text);
//! ```

pub mod commands;
pub mod fallback;

use crate::config::StockConfig;
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::formatter::{Formatter, TextFormatter};
use crate::series::{QuoteProvider, SeriesProvider};
use crate::symbols::{Instrument, SymbolResolver};
use chrono::NaiveDate;
use std::sync::Arc;

pub use commands::{Command, CommandParser};
pub use fallback::{DEFAULT_FALLBACK_MESSAGE, FallbackResponder, StaticFallback};

/// Sessions listed under a live quote
const RECENT_SESSIONS: usize = 5;

/// Configuration for the stock bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Stock query configuration
    pub stock_config: StockConfig,
    /// Welcome message
    pub welcome_message: String,
    /// Prompt prefix
    pub prompt: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            stock_config: StockConfig::default(),
            welcome_message: "台股查詢機器人 - 輸入「幫助」查看指令".to_string(),
            prompt: ">>> ".to_string(),
        }
    }
}

impl BotConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            stock_config: StockConfig::from_env()?,
            ..Default::default()
        })
    }

    /// Create a builder
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }
}

/// Builder for BotConfig
#[derive(Debug, Default)]
pub struct BotConfigBuilder {
    stock_config: Option<StockConfig>,
    welcome_message: Option<String>,
    prompt: Option<String>,
}

impl BotConfigBuilder {
    /// Set stock config
    pub fn stock_config(mut self, config: StockConfig) -> Self {
        self.stock_config = Some(config);
        self
    }

    /// Set welcome message
    pub fn welcome_message(mut self, msg: impl Into<String>) -> Self {
        self.welcome_message = Some(msg.into());
        self
    }

    /// Set prompt
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Build the config
    pub fn build(self) -> BotConfig {
        let defaults = BotConfig::default();
        BotConfig {
            stock_config: self.stock_config.unwrap_or(defaults.stock_config),
            welcome_message: self.welcome_message.unwrap_or(defaults.welcome_message),
            prompt: self.prompt.unwrap_or(defaults.prompt),
        }
    }
}

/// What kind of answer a reply carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Help,
    LivePrice,
    Query,
    Fallback,
}

/// One formatted reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub kind: ReplyKind,
    pub text: String,
}

impl BotReply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Stock query bot
pub struct StockBot {
    parser: CommandParser,
    engine: QueryEngine,
    quotes: Option<Arc<dyn QuoteProvider>>,
    fallback: Arc<dyn FallbackResponder>,
    formatter: Box<dyn Formatter>,
    config: BotConfig,
}

impl StockBot {
    /// Create a bot over a series provider and alias table
    pub fn new(
        config: BotConfig,
        provider: Arc<dyn SeriesProvider>,
        resolver: Arc<SymbolResolver>,
    ) -> Self {
        let stock_config = Arc::new(config.stock_config.clone());
        let parser = CommandParser::new(Arc::clone(&resolver), &stock_config);
        let formatter = TextFormatter::for_market(stock_config.market_utc_offset_hours);
        let engine = QueryEngine::new(provider, resolver, stock_config);

        Self {
            parser,
            engine,
            quotes: None,
            fallback: Arc::new(StaticFallback::default()),
            formatter: Box::new(formatter),
            config,
        }
    }

    /// Enable live quotes
    pub fn with_quote_provider(mut self, quotes: Arc<dyn QuoteProvider>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    /// Replace the fallback responder
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackResponder>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Pin "today" for rolling windows and recent sessions
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.engine = self.engine.with_today(today);
        self
    }

    /// Get the welcome message
    pub fn welcome(&self) -> &str {
        &self.config.welcome_message
    }

    /// Get the prompt
    pub fn prompt(&self) -> &str {
        &self.config.prompt
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// Process user input and return a reply
    pub async fn process_input(&self, input: &str) -> Result<BotReply> {
        let command = self.parser.parse(input);
        self.execute_command(command).await
    }

    /// Execute a parsed command
    pub async fn execute_command(&self, command: Command) -> Result<BotReply> {
        match command {
            Command::Help => Ok(BotReply::new(ReplyKind::Help, self.formatter.format_help())),
            Command::LivePrice { code, instrument } => {
                let text = self.live_price(&code, instrument).await;
                Ok(BotReply::new(ReplyKind::LivePrice, text))
            }
            Command::Query(query) => {
                let result = self.engine.execute(&query).await;
                tracing::debug!(
                    query = query.description(),
                    success_rate = result.success_rate(),
                    "Query finished"
                );
                Ok(BotReply::new(
                    ReplyKind::Query,
                    self.formatter.format_result(&result),
                ))
            }
            Command::Invalid(error) => Ok(BotReply::new(
                ReplyKind::Query,
                self.formatter.format_error(&error),
            )),
            Command::Unparsed { text } => {
                let reply = self.fallback.respond(&text).await?;
                Ok(BotReply::new(ReplyKind::Fallback, reply))
            }
        }
    }

    async fn live_price(&self, code: &str, instrument: Option<Arc<Instrument>>) -> String {
        let Some(quotes) = &self.quotes else {
            return "即時報價功能未啟用".to_string();
        };

        let instrument = instrument.unwrap_or_else(|| {
            let suffix = &self.engine.config().market_suffix;
            Arc::new(Instrument::new(format!("{code}{suffix}"), code))
        });

        let quote = match quotes.latest_quote(&instrument.symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!(symbol = %instrument.symbol, error = %e, "Live quote unavailable");
                return format!("{code}: 無法取得即時報價");
            }
        };

        let recent = self.engine.recent_sessions(&instrument, RECENT_SESSIONS).await;
        self.formatter
            .format_live_quote(&instrument.to_string(), &quote, &recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use crate::series::{InMemorySeriesProvider, LiveQuote, MockQuoteProvider, PricePoint, PriceSeries};
    use chrono::{TimeZone, Utc};
    use fallback::MockFallbackResponder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider() -> Arc<dyn SeriesProvider> {
        let tsmc = PriceSeries::new(vec![
            PricePoint::new(date(2023, 6, 30), 498.0),
            PricePoint::new(date(2023, 7, 3), 500.0),
            PricePoint::new(date(2023, 7, 4), 505.0),
            PricePoint::new(date(2023, 7, 5), 503.0),
            PricePoint::new(date(2023, 7, 6), 510.0),
            PricePoint::new(date(2023, 7, 7), 512.0),
        ])
        .unwrap();
        Arc::new(InMemorySeriesProvider::new().with_series("2330.TW", tsmc))
    }

    fn bot() -> StockBot {
        let resolver = Arc::new(SymbolResolver::with_builtin().unwrap());
        StockBot::new(BotConfig::default(), provider(), resolver).with_today(date(2023, 7, 7))
    }

    #[test]
    fn test_bot_config_default() {
        let config = BotConfig::default();
        assert!(!config.welcome_message.is_empty());
        assert_eq!(config.prompt, ">>> ");
    }

    #[test]
    fn test_bot_config_builder() {
        let config = BotConfig::builder().prompt("$ ").welcome_message("hi").build();

        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.welcome_message, "hi");
        assert_eq!(config.stock_config.lookback_days, 25);
    }

    #[test]
    fn test_help_reply() {
        let reply = tokio_test::block_on(bot().process_input("幫助")).unwrap();
        assert_eq!(reply.kind, ReplyKind::Help);
        assert!(reply.text.contains("最近<N>天"));
    }

    #[tokio::test]
    async fn test_point_reply_with_substitution() {
        let reply = bot().process_input("台積電 2023-07-01").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Query);
        assert_eq!(
            reply.text,
            "台積電 (2330) 2023-07-01 收盤價: 498.00 (2023-07-01 非交易日，以 2023-06-30 替代)"
        );
    }

    #[tokio::test]
    async fn test_point_reply_without_earlier_session() {
        let tsmc = PriceSeries::new(vec![
            PricePoint::new(date(2023, 7, 3), 500.0),
            PricePoint::new(date(2023, 7, 4), 505.0),
        ])
        .unwrap();
        let provider = Arc::new(InMemorySeriesProvider::new().with_series("2330.TW", tsmc));
        let resolver = Arc::new(SymbolResolver::with_builtin().unwrap());
        let bot = StockBot::new(BotConfig::default(), provider, resolver);

        let reply = bot.process_input("台積電 2023-07-01").await.unwrap();
        assert_eq!(reply.text, "台積電: 2023-07-01 前 25 天內沒有交易日資料");
    }

    #[tokio::test]
    async fn test_batch_reply_lines() {
        let reply = bot()
            .process_input("台積電 不存在 聯發科 2023-07-03")
            .await
            .unwrap();
        let lines: Vec<&str> = reply.text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("500.00"));
        assert_eq!(lines[1], "不存在: 查無此股票");
        assert_eq!(lines[2], "聯發科: 查無資料");
    }

    #[tokio::test]
    async fn test_rolling_reply() {
        let reply = bot().process_input("台積電最近2天").await.unwrap();
        assert!(reply.text.contains("最近2天平均: 511.00"));
        assert!(reply.text.ends_with("高於平均 1.00"));
    }

    #[tokio::test]
    async fn test_invalid_range_reply() {
        let reply = bot()
            .process_input("台積電 平均 2023-07-05 2023-07-01")
            .await
            .unwrap();
        assert_eq!(reply.text, "起日 2023-07-05 晚於迄日 2023-07-01");
    }

    #[tokio::test]
    async fn test_unparsed_goes_to_fallback() {
        let reply = bot().process_input("hello there").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Fallback);
        assert_eq!(reply.text, DEFAULT_FALLBACK_MESSAGE);

        let mut fallback = MockFallbackResponder::new();
        fallback
            .expect_respond()
            .withf(|text| text == "今天天氣如何")
            .times(1)
            .returning(|_| Ok("晴天".to_string()));
        let bot = bot().with_fallback(Arc::new(fallback));
        let reply = bot.process_input("今天天氣如何").await.unwrap();
        assert_eq!(reply.text, "晴天");
    }

    #[tokio::test]
    async fn test_fallback_error_propagates() {
        let mut fallback = MockFallbackResponder::new();
        fallback
            .expect_respond()
            .returning(|_| Err(StockError::YahooFinanceError("down".to_string())));
        let bot = bot().with_fallback(Arc::new(fallback));
        assert!(bot.process_input("hello there").await.is_err());
    }

    #[tokio::test]
    async fn test_live_price_reply() {
        let mut quotes = MockQuoteProvider::new();
        quotes
            .expect_latest_quote()
            .withf(|symbol| symbol == "2330.TW")
            .times(1)
            .returning(|symbol| {
                Ok(LiveQuote {
                    symbol: symbol.to_string(),
                    timestamp: Utc.with_ymd_and_hms(2023, 7, 7, 5, 30, 0).unwrap(),
                    price: 512.0,
                    open: 508.0,
                    high: 515.0,
                    low: 507.0,
                    volume: 31_000,
                })
            });

        let bot = bot().with_quote_provider(Arc::new(quotes));
        let reply = bot.process_input("2330").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::LivePrice);

        let lines: Vec<&str> = reply.text.lines().collect();
        assert_eq!(lines[0], "台積電 (2330) 13:30:00");
        assert_eq!(lines[5], "最近五日價格:");
        assert_eq!(lines[6], "[2023-07-07] 512.00");
        assert_eq!(lines.len(), 6 + RECENT_SESSIONS);
    }

    #[tokio::test]
    async fn test_live_price_failure_is_a_message() {
        let mut quotes = MockQuoteProvider::new();
        quotes
            .expect_latest_quote()
            .returning(|_| Err(StockError::YahooFinanceError("no quotes".to_string())));

        let bot = bot().with_quote_provider(Arc::new(quotes));
        let reply = bot.process_input("9999").await.unwrap();
        assert_eq!(reply.text, "9999: 無法取得即時報價");
    }

    #[tokio::test]
    async fn test_live_price_disabled() {
        let reply = bot().process_input("台積電").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::LivePrice);
        assert_eq!(reply.text, "即時報價功能未啟用");
    }
}
