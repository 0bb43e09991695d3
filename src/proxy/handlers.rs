//! HTTP request handlers.

use axum::{
    extract::{Extension, Multipart, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::time::Instant;

use super::server::{AppState, RequestId};
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ExtractTextResponse, SearchSongRequest,
};
use crate::error::{Error, Result};
use crate::router::RouteOutcome;
use crate::services::{fetch_image, Upload};

/// Response header: provider name that produced the completion.
pub const PROVIDER_HEADER: &str = "x-omnicron-provider";
/// Response header: "true" when the weak model answered after the strong one failed.
pub const FALLBACK_HEADER: &str = "x-omnicron-fallback";
/// Response header: wall-clock latency in milliseconds.
pub const LATENCY_MS_HEADER: &str = "x-omnicron-latency-ms";

/// Attach routing metadata headers to a chat response.
fn attach_route_headers(response: &mut Response, outcome: &RouteOutcome, latency_ms: u64) {
    let headers = response.headers_mut();

    if let Ok(provider) = HeaderValue::from_str(&outcome.provider) {
        headers.insert(HeaderName::from_static(PROVIDER_HEADER), provider);
    }
    headers.insert(
        HeaderName::from_static(LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms),
    );
    if outcome.fell_back {
        headers.insert(
            HeaderName::from_static(FALLBACK_HEADER),
            HeaderValue::from_static("true"),
        );
    }
}

/// Handle POST /api/v1/chat/completion
pub async fn chat_completion(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response> {
    let start = Instant::now();

    tracing::info!(
        request_id = %request_id.0,
        model = ?request.model,
        messages = request.messages.len(),
        stream = request.stream,
        shuffle = request.shuffle,
        image = request.image_url().is_some(),
        "Received chat completion request"
    );

    // Reject bad requests before downloading anything.
    state.router.validate_model(request.model.as_deref())?;
    if request.messages.is_empty() {
        return Err(Error::BadRequest("messages must not be empty".to_string()));
    }

    let image = match request.image_url() {
        Some(url) => Some(fetch_image(&state.http_client, url, request.timeout()).await?),
        None => None,
    };

    let chat = request.into_chat_request(image);
    let outcome = match state.router.route(&chat).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id.0,
                error = %e,
                latency_ms = start.elapsed().as_millis() as u64,
                "Chat completion failed"
            );
            return Err(e);
        }
    };

    let latency_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        request_id = %request_id.0,
        provider = %outcome.provider,
        model = ?outcome.model,
        fell_back = outcome.fell_back,
        latency_ms,
        "Chat completion succeeded"
    );

    let mut response = Json(ChatCompletionResponse {
        response: outcome.result.clone(),
    })
    .into_response();
    attach_route_headers(&mut response, &outcome, latency_ms);
    Ok(response)
}

/// Read the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes: Bytes = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(e.to_string()))?;
        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }
    Err(Error::BadRequest("missing multipart field 'file'".to_string()))
}

fn not_configured(service: &str) -> Error {
    Error::Service {
        service: service.to_string(),
        message: "service not configured".to_string(),
    }
}

/// Handle POST /api/v1/recognize-audio
pub async fn recognize_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    const SERVICE: &str = "processing shazam";

    let songs = state.songs.clone().ok_or_else(|| not_configured(SERVICE))?;
    let audio = read_upload(multipart).await?;
    tracing::info!(filename = %audio.filename, bytes = audio.bytes.len(), "Recognizing audio");

    songs.recognize(audio).await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Song recognition failed");
        Error::Service {
            service: SERVICE.to_string(),
            message: e.to_string(),
        }
    })
}

/// Handle POST /api/v1/search-song
pub async fn search_song(
    State(state): State<AppState>,
    Json(request): Json<SearchSongRequest>,
) -> Result<Json<serde_json::Value>> {
    const SERVICE: &str = "searching song";

    let songs = state.songs.clone().ok_or_else(|| not_configured(SERVICE))?;
    tracing::info!(song = %request.song, limit = request.limit, "Searching song");

    songs
        .search(&request.song, request.limit, request.proxy.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Song search failed");
            Error::Service {
                service: SERVICE.to_string(),
                message: e.to_string(),
            }
        })
}

/// Handle POST /api/v1/extract-text
pub async fn extract_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractTextResponse>> {
    const SERVICE: &str = "extracting text";

    let extractor = state.extractor.clone().ok_or_else(|| not_configured(SERVICE))?;
    let file = read_upload(multipart).await?;
    tracing::info!(filename = %file.filename, content_type = ?file.content_type, "Extracting text");

    extractor
        .extract(file)
        .await
        .map(|text| Json(ExtractTextResponse { text }))
        .map_err(|e| {
            tracing::error!(error = %e, "Text extraction failed");
            Error::Service {
                service: SERVICE.to_string(),
                message: e.to_string(),
            }
        })
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "omnicron"
    }))
}

/// Handle GET /
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "Hi": "World" }))
}
