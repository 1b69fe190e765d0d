//! Replies for input the command parser did not claim

use crate::error::Result;
use async_trait::async_trait;

/// Default answer when no command matched
pub const DEFAULT_FALLBACK_MESSAGE: &str = "請輸入有效指令或輸入\"幫助\"來查看所有功能。";

/// Free-text collaborator: receives unparsed input, returns the reply text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String>;
}

/// Always answers with the same message
#[derive(Debug, Clone)]
pub struct StaticFallback {
    message: String,
}

impl StaticFallback {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for StaticFallback {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_MESSAGE)
    }
}

#[async_trait]
impl FallbackResponder for StaticFallback {
    async fn respond(&self, text: &str) -> Result<String> {
        tracing::debug!(text, "No command matched");
        Ok(self.message.clone())
    }
}
