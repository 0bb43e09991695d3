//! Normalized chat request and result types shared by the router and providers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A chat message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A chat request after HTTP decoding and image download.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Conversation in order; never empty once it reaches the router.
    pub messages: Vec<Message>,
    pub model: Option<String>,
    /// Raw image bytes; routes the request to the image-capable provider.
    pub image: Option<Bytes>,
    pub stream: bool,
    /// Upstream proxy address, handed to the provider untouched.
    pub proxy: Option<String>,
    /// Upstream timeout, handed to the provider untouched.
    pub timeout: Option<Duration>,
    /// Randomize the general pool's order for this request.
    pub shuffle: bool,
}

/// What a single provider attempt needs to know.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    /// `None` lets the provider use its configured default model.
    pub model: Option<&'a str>,
    pub messages: &'a [Message],
    pub image: Option<&'a Bytes>,
    pub stream: bool,
    pub proxy: Option<&'a str>,
    pub timeout: Option<Duration>,
}

impl ChatRequest {
    /// Borrow this request as a dispatch for the given model.
    pub fn dispatch<'a>(&'a self, model: Option<&'a str>) -> DispatchRequest<'a> {
        DispatchRequest {
            model,
            messages: &self.messages,
            image: self.image.as_ref(),
            stream: self.stream,
            proxy: self.proxy.as_deref(),
            timeout: self.timeout,
        }
    }
}

/// Normalized chat output: one final text or the drained stream chunks in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatResult {
    Complete(String),
    Chunks(Vec<String>),
}

/// A successful route: the result plus which model and provider produced it.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub result: ChatResult,
    pub provider: String,
    /// Model that was requested upstream; `None` means the provider default.
    pub model: Option<String>,
    /// Whether the strong-to-weak substitution was needed.
    pub fell_back: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_result_serializes_untagged() {
        let complete = serde_json::to_value(ChatResult::Complete("hello".to_string())).unwrap();
        assert_eq!(complete, serde_json::json!("hello"));

        let chunks = serde_json::to_value(ChatResult::Chunks(vec![
            "a".to_string(),
            "b".to_string(),
        ]))
        .unwrap();
        assert_eq!(chunks, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn dispatch_borrows_request_fields() {
        let request = ChatRequest {
            messages: vec![Message::new("user", "hi")],
            model: Some("gpt-4".to_string()),
            stream: true,
            proxy: Some("http://127.0.0.1:3128".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let dispatch = request.dispatch(Some("gpt-3.5-turbo"));
        assert_eq!(dispatch.model, Some("gpt-3.5-turbo"));
        assert_eq!(dispatch.messages.len(), 1);
        assert!(dispatch.stream);
        assert_eq!(dispatch.proxy, Some("http://127.0.0.1:3128"));
        assert_eq!(dispatch.timeout, Some(Duration::from_secs(5)));
        assert!(dispatch.image.is_none());
    }
}
