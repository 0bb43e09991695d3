//! Song recognition and search.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{check_status, proxied_client, ServiceError, Upload};
use crate::config::ServiceConfig;

/// Result count used when a search does not specify one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 6;

/// External song recognition/search backend. Results are opaque JSON.
#[async_trait]
pub trait SongService: Send + Sync {
    /// Identify the song in an uploaded audio clip.
    async fn recognize(&self, audio: Upload) -> Result<serde_json::Value, ServiceError>;

    /// Search tracks by free text.
    async fn search(
        &self,
        query: &str,
        limit: u32,
        proxy: Option<&str>,
    ) -> Result<serde_json::Value, ServiceError>;
}

/// [`SongService`] backed by an HTTP recognizer exposing `/recognize` and `/search`.
#[derive(Debug, Clone)]
pub struct HttpSongService {
    url: String,
    timeout: Duration,
    client: Client,
}

impl HttpSongService {
    pub fn new(config: &ServiceConfig, client: Client) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        }
    }
}

#[async_trait]
impl SongService for HttpSongService {
    async fn recognize(&self, audio: Upload) -> Result<serde_json::Value, ServiceError> {
        tracing::debug!(filename = %audio.filename, bytes = audio.bytes.len(), "Recognizing song");

        let response = self
            .client
            .post(format!("{}/recognize", self.url))
            .timeout(self.timeout)
            .multipart(audio.into_form()?)
            .send()
            .await?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn search(
        &self,
        query: &str,
        limit: u32,
        proxy: Option<&str>,
    ) -> Result<serde_json::Value, ServiceError> {
        tracing::debug!(query = %query, limit, "Searching song");

        let limit = limit.to_string();
        let response = proxied_client(&self.client, proxy)?
            .get(format!("{}/search", self.url))
            .query(&[("query", query), ("limit", limit.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}
