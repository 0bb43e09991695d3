//! Text extraction from images (OCR) and multi-page documents.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, ServiceError, Upload};
use crate::config::ServiceConfig;

/// Extensions handled page by page rather than as a single image.
const DOCUMENT_EXTENSIONS: [&str; 8] = ["pdf", "xps", "epub", "mobi", "fb2", "cbz", "svg", "txt"];

/// Extracted text: one string for an image, one entry per page for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedText {
    Text(String),
    Pages(Vec<String>),
}

/// External OCR / document text backend.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file: Upload) -> Result<ExtractedText, ServiceError>;
}

/// Whether an upload should be treated as a multi-page document.
pub fn is_document(filename: &str, content_type: Option<&str>) -> bool {
    let by_type = content_type.is_some_and(|ct| {
        matches!(
            ct,
            "application/pdf"
                | "application/oxps"
                | "application/vnd.ms-xpsdocument"
                | "application/epub+zip"
                | "application/x-mobipocket-ebook"
                | "application/x-fictionbook+xml"
                | "application/vnd.comicbook+zip"
                | "image/svg+xml"
                | "text/plain"
        )
    });

    let by_extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()));

    by_type || by_extension
}

#[derive(Deserialize)]
struct ExtractResponse {
    text: ExtractedText,
}

/// [`TextExtractor`] backed by an HTTP OCR service with `/image` and `/document`.
#[derive(Debug, Clone)]
pub struct HttpTextExtractor {
    url: String,
    timeout: Duration,
    client: Client,
}

impl HttpTextExtractor {
    pub fn new(config: &ServiceConfig, client: Client) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, file: Upload) -> Result<ExtractedText, ServiceError> {
        let document = is_document(&file.filename, file.content_type.as_deref());
        let endpoint = if document { "document" } else { "image" };
        tracing::debug!(filename = %file.filename, endpoint, "Extracting text");

        let response = self
            .client
            .post(format!("{}/{}", self.url, endpoint))
            .timeout(self.timeout)
            .multipart(file.into_form()?)
            .send()
            .await?;

        let body: ExtractResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(match (document, body.text) {
            (true, ExtractedText::Text(text)) => ExtractedText::Pages(vec![text]),
            (false, ExtractedText::Pages(pages)) => ExtractedText::Text(pages.join("\n")),
            (_, text) => text,
        })
    }
}
