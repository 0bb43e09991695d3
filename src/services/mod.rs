//! Pass-through clients for the non-chat backends.
//!
//! Song recognition/search and OCR are external HTTP services; the gateway
//! only forwards uploads and queries and returns what comes back.

mod image;
mod ocr;
mod songs;

pub use image::fetch_image;
pub use ocr::{is_document, ExtractedText, HttpTextExtractor, TextExtractor};
pub use songs::{HttpSongService, SongService, DEFAULT_SEARCH_LIMIT};

use bytes::Bytes;
use reqwest::{multipart, Client, Proxy};

/// A file received from a caller, ready to forward.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Multipart form with the upload under the `file` field.
    fn into_form(self) -> Result<multipart::Form, ServiceError> {
        let mut part = multipart::Part::bytes(self.bytes.to_vec()).file_name(self.filename);
        if let Some(content_type) = &self.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ServiceError::Transport(e.to_string()))?;
        }
        Ok(multipart::Form::new().part("file", part))
    }
}

/// Failure talking to an external service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Transport(e.to_string())
    }
}

/// Shared client, or a one-off client routed through `proxy`.
pub(crate) fn proxied_client(base: &Client, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    match proxy {
        None => Ok(base.clone()),
        Some(proxy) => Client::builder().proxy(Proxy::all(proxy)?).build(),
    }
}

/// Turn a non-2xx response into [`ServiceError::Status`], pass others through.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}
