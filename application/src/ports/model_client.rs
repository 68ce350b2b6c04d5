//! Model client port
//!
//! Defines how the application layer talks to the planning model.
//! Implementations (adapters) live in the infrastructure layer.

use async_trait::async_trait;
use planwire_domain::prompt::Message;

/// Why a model request failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl ModelError {
    /// Transport failures and timeouts are worth retrying; an empty
    /// response is the backend answering, just uselessly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

/// Port for generating model completions.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate one reply for the given conversation.
    async fn generate(&self, messages: &[Message]) -> Result<String, ModelError>;
}
