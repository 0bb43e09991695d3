//! HTTP gateway module.
//!
//! Exposes the chat, song and text-extraction endpoints under `/api/v1`,
//! guarded by the shared `Api-Key`.

mod auth;
mod handlers;
mod server;
pub mod types;

pub use auth::{require_api_key, ApiKeyGate, API_KEY_HEADER};
pub use handlers::{FALLBACK_HEADER, LATENCY_MS_HEADER, PROVIDER_HEADER};
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use types::{ChatCompletionRequest, ChatCompletionResponse, SearchSongRequest};
