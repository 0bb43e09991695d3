//! Adapter for OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Client};

use super::{sse, ChatProvider, Completion, ProviderError};
use crate::config::{ApiKey, ProviderConfig};
use crate::router::{DispatchRequest, Message};
use crate::services::proxied_client;

/// A chat backend speaking the OpenAI chat completions wire format.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    name: String,
    url: String,
    api_key: Option<ApiKey>,
    default_model: String,
    client: Client,
}

impl OpenAiCompatProvider {
    /// `fallback_model` is sent when neither the caller nor the config names a model.
    pub fn new(config: &ProviderConfig, fallback_model: &str, client: Client) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            default_model: config
                .default_model
                .clone()
                .unwrap_or_else(|| fallback_model.to_string()),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }

    /// Shared client, or a one-off client routed through the caller's proxy.
    fn client_for(&self, proxy: Option<&str>) -> Result<Client, ProviderError> {
        proxied_client(&self.client, proxy).map_err(|e| ProviderError::Transport {
            provider: self.name.clone(),
            message: format!("invalid proxy '{}': {}", proxy.unwrap_or_default(), e),
        })
    }

    fn build_body(&self, request: &DispatchRequest<'_>) -> serde_json::Value {
        let model = request.model.unwrap_or(self.default_model.as_str());
        serde_json::json!({
            "model": model,
            "messages": wire_messages(request.messages, request.image.map(|b| b.as_ref())),
            "stream": request.stream,
        })
    }
}

/// Serialize messages, attaching the image to the last user message as a data URL.
fn wire_messages(messages: &[Message], image: Option<&[u8]>) -> Vec<serde_json::Value> {
    let image_index = image.and_then(|_| {
        messages
            .iter()
            .rposition(|m| m.role == "user")
            .or_else(|| messages.len().checked_sub(1))
    });

    messages
        .iter()
        .enumerate()
        .map(|(i, message)| match (image, Some(i) == image_index) {
            (Some(bytes), true) => {
                let data_url = format!(
                    "data:{};base64,{}",
                    sniff_image_mime(bytes),
                    base64::engine::general_purpose::STANDARD.encode(bytes)
                );
                serde_json::json!({
                    "role": message.role,
                    "content": [
                        {"type": "text", "text": message.content},
                        {"type": "image_url", "image_url": {"url": data_url}},
                    ],
                })
            }
            _ => serde_json::json!({"role": message.role, "content": message.content}),
        })
        .collect()
}

/// Best-effort mime type from magic bytes.
fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, request: &DispatchRequest<'_>) -> Result<Completion, ProviderError> {
        let client = self.client_for(request.proxy)?;

        let mut upstream_request = client
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.build_body(request));

        if let Some(api_key) = &self.api_key {
            upstream_request = upstream_request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }
        if let Some(timeout) = request.timeout {
            upstream_request = upstream_request.timeout(timeout);
        }

        let response = upstream_request
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        if request.stream {
            return Ok(Completion::Stream(sse::chunk_stream(
                self.name.clone(),
                response.bytes_stream(),
            )));
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: self.name.clone(),
                    message: e.to_string(),
                })?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|text| Completion::Text(text.to_string()))
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: self.name.clone(),
                message: "missing choices[0].message.content".to_string(),
            })
    }
}
