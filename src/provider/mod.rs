//! Completion providers: the text-generation service behind the agents.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::AnthropicClient;
pub use error::ProviderError;
pub use types::{CompletionRequest, Message, MessagesRequest, MessagesResponse, Role, Usage};

/// Anything that turns role-tagged messages into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
