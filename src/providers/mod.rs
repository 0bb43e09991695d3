//! Chat provider capability and its HTTP adapter.
//!
//! The router only sees [`ChatProvider`]; every upstream backend is an
//! implementation of it, which keeps test doubles trivial.

mod openai;
pub mod sse;

pub use openai::OpenAiCompatProvider;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::router::DispatchRequest;

/// Incremental text chunks from a streaming provider response.
pub type ChunkStream = BoxStream<'static, Result<String, ProviderError>>;

/// What a provider hands back from a successful attempt.
pub enum Completion {
    /// The complete response text.
    Text(String),
    /// A finite stream of text chunks, consumed once.
    Stream(ChunkStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Failure of a single provider attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider '{provider}' returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to reach provider '{provider}': {message}")]
    Transport { provider: String, message: String },

    #[error("Invalid response from provider '{provider}': {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Stream from provider '{provider}' failed: {message}")]
    Stream { provider: String, message: String },
}

/// An external chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Name used in logs and response headers.
    fn name(&self) -> &str;

    /// Make one attempt; no retries happen at this layer.
    ///
    /// Timeout and proxy from the request must be applied here.
    async fn attempt(&self, request: &DispatchRequest<'_>) -> Result<Completion, ProviderError>;
}
