//! Response generation

mod generator;

use async_trait::async_trait;

pub use generator::GeminiGenerator;

use crate::Result;
use crate::conversation::ConversationHistory;

/// Produces the agent's next reply from the conversation so far
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate a reply to `history`, whose last turn is the caller's
    ///
    /// Implementations must not retain or modify the history.
    ///
    /// # Errors
    ///
    /// Returns error if the provider fails or returns no usable reply
    async fn generate(&self, history: &ConversationHistory) -> Result<String>;
}
