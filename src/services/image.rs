//! Image download for vision chat requests.

use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

use crate::error::{Error, Result};

/// Download an image with a single GET. No retry.
///
/// Any transport error or non-success status becomes [`Error::DownloadFailed`].
pub async fn fetch_image(client: &Client, url: &str, timeout: Option<Duration>) -> Result<Bytes> {
    tracing::info!(url = %url, "Downloading image");

    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Image download failed");
            Error::DownloadFailed(e.to_string())
        })?;

    response
        .bytes()
        .await
        .map_err(|e| Error::DownloadFailed(e.to_string()))
}
