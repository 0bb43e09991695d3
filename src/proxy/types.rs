//! Request and response bodies of the HTTP API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::router::{ChatRequest, ChatResult, Message};
use crate::services::{ExtractedText, DEFAULT_SEARCH_LIMIT};

/// Body of `POST /chat/completion`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Upstream timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ChatCompletionRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// The image URL, ignoring an empty string.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Convert into the router's request once the image (if any) is downloaded.
    pub fn into_chat_request(self, image: Option<Bytes>) -> ChatRequest {
        let timeout = self.timeout();
        ChatRequest {
            messages: self.messages,
            model: self.model,
            image,
            stream: self.stream,
            proxy: self.proxy,
            timeout,
            shuffle: self.shuffle,
        }
    }
}

/// Body returned by `POST /chat/completion`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub response: ChatResult,
}

/// Body of `POST /search-song`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSongRequest {
    pub song: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_search_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

/// Body returned by `POST /extract-text`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractTextResponse {
    pub text: ExtractedText,
}
