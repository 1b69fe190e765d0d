//! Taiwan stock query bot
//!
//! Answers short Chinese text commands about listed Taiwan stocks:
//!
//! - Close price on a date, falling back to the previous trading session
//! - Close prices for several stocks on one date
//! - Average close over a date range
//! - Rolling average of the most recent N sessions against the latest close
//! - Highest or lowest close over a range
//! - Live quote with the last five sessions
//!
//! # Architecture
//!
//! - [`symbols::SymbolResolver`]: alias table from names and codes to instruments
//! - [`dates`]: strict date parsing and trading-day fallback
//! - [`series::SeriesProvider`]: daily close source, backed by Yahoo Finance
//!   ([`api::YahooFinanceClient`]) behind a TTL cache ([`cache::CachedSeriesProvider`])
//! - [`engine`]: pure analytics plus the [`engine::QueryEngine`] coordinator
//! - [`bot`]: command parsing, dispatch and reply formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_query::bot::{BotConfig, StockBot};
//! use stock_query::{InMemorySeriesProvider, SymbolResolver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = Arc::new(SymbolResolver::with_builtin()?);
//!     let provider = Arc::new(InMemorySeriesProvider::new());
//!     let bot = StockBot::new(BotConfig::default(), provider, resolver);
//!
//!     let reply = bot.process_input("台積電 平均").await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod cache;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod series;
pub mod symbols;

// Re-export main types for convenience
pub use bot::{BotConfig, BotReply, ReplyKind, StockBot};
pub use config::{DEFAULT_LOOKBACK_DAYS, StockConfig};
pub use engine::{Query, QueryEngine, QueryResult};
pub use error::{QueryError, Result, StockError};
pub use series::{InMemorySeriesProvider, PriceSeries, QuoteProvider, SeriesProvider};
pub use symbols::{Instrument, SymbolResolver};
