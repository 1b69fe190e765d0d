//! Logging and tracing utilities

use crate::config::AppConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing from [`AppConfig::from_env`]
pub fn init_tracing() -> AppConfig {
    let config = AppConfig::from_env();
    init_tracing_for(&config);
    config
}

/// Initialize tracing, falling back to `default_filter` when `RUST_LOG` is unset
pub fn init_tracing_with(default_filter: &str) {
    tracing_subscriber::registry()
        .with(filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Production emits JSON lines; everything else the human-readable format
fn init_tracing_for(config: &AppConfig) {
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter(&config.log_filter))
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        init_tracing_with(&config.log_filter);
    }
}

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}
