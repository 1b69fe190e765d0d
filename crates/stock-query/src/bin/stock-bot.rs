//! Taiwan stock query bot CLI
//!
//! Interactive REPL over stdin, or a single reply with `--command`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stock-bot -p stock-query
//! cargo run --bin stock-bot -p stock-query -- --command "台積電 2023-07-03"
//! ```

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use stock_query::api::YahooFinanceClient;
use stock_query::bot::{BotConfig, StockBot};
use stock_query::cache::CachedSeriesProvider;
use stock_query::{StockConfig, SymbolResolver};
use tracing::info;

const EXIT_WORDS: &[&str] = &["exit", "quit", "退出"];

#[derive(Parser, Debug)]
#[command(name = "stock-bot")]
#[command(about = "Taiwan stock price query bot", long_about = None)]
struct Args {
    /// Answer one command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// JSON file with extra aliases
    #[arg(long)]
    alias_file: Option<PathBuf>,

    /// Calendar days to look back for a previous trading session
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Fetch batch members concurrently
    #[arg(long)]
    parallel_batch: bool,
}

fn stock_config(args: &Args) -> stock_query::Result<StockConfig> {
    let mut builder = StockConfig::builder().with_env()?;
    if let Some(path) = &args.alias_file {
        builder = builder.alias_file(path);
    }
    if let Some(days) = args.lookback_days {
        builder = builder.lookback_days(days);
    }
    if args.parallel_batch {
        builder = builder.parallel_batch(true);
    }
    builder.build()
}

fn build_bot(config: StockConfig) -> stock_query::Result<StockBot> {
    let mut resolver = SymbolResolver::builder().builtin()?;
    if let Some(path) = &config.alias_file {
        resolver = resolver.alias_file(path)?;
    }
    let resolver = Arc::new(resolver.build()?);

    let settings = Arc::new(config.clone());
    let series = CachedSeriesProvider::new(
        YahooFinanceClient::new(Arc::clone(&settings))?,
        config.cache_ttl_series,
    );
    let quotes = Arc::new(YahooFinanceClient::new(settings)?);

    let bot_config = BotConfig::builder().stock_config(config).build();
    Ok(StockBot::new(bot_config, Arc::new(series), resolver).with_quote_provider(quotes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = stock_utils::init_tracing();

    let args = Args::parse();
    let config = stock_config(&args)?;
    info!(
        app = %app.app_name,
        environment = %app.environment,
        lookback_days = config.lookback_days,
        parallel_batch = config.parallel_batch,
        "Starting stock-bot"
    );

    let bot = build_bot(config)?;

    if let Some(command) = args.command {
        let reply = bot.process_input(&command).await?;
        println!("{}", reply.text);
        return Ok(());
    }

    println!("{}\n", bot.welcome());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}", bot.prompt());
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&input) {
            println!("Goodbye!");
            break;
        }

        match bot.process_input(input).await {
            Ok(reply) => println!("{}\n", reply.text),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    Ok(())
}
