//! Shared utilities for tw-stock-bot
//!
//! Logging setup and typed environment configuration used across the workspace.

pub mod config;
pub mod logging;

pub use config::{AppConfig, EnvError, env_flag, env_var};
pub use logging::{init_tracing, init_tracing_with};
