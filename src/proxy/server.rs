//! HTTP server setup and configuration.

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use super::auth::{require_api_key, ApiKeyGate};
use super::handlers;
use crate::config::Config;
use crate::router::Router as ProviderRouter;
use crate::services::{HttpSongService, HttpTextExtractor, SongService, TextExtractor};

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Uploads (audio clips, scanned documents) can be large.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Correlation ID assigned to every request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProviderRouter>,
    pub http_client: Client,
    pub gate: Arc<ApiKeyGate>,
    pub songs: Option<Arc<dyn SongService>>,
    pub extractor: Option<Arc<dyn TextExtractor>>,
}

impl AppState {
    /// Build the router and service adapters from configuration.
    pub fn from_config(config: &Config, http_client: Client) -> Self {
        let songs = config.songs.as_ref().map(|s| {
            Arc::new(HttpSongService::new(s, http_client.clone())) as Arc<dyn SongService>
        });
        let extractor = config.ocr.as_ref().map(|s| {
            Arc::new(HttpTextExtractor::new(s, http_client.clone())) as Arc<dyn TextExtractor>
        });

        Self {
            router: Arc::new(ProviderRouter::from_config(config, &http_client)),
            gate: Arc::new(ApiKeyGate::new(config.server.api_key.clone())),
            http_client,
            songs,
            extractor,
        }
    }
}

/// Tag the request with a fresh [`RequestId`] and echo it on the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat/completion", post(handlers::chat_completion))
        .route("/recognize-audio", post(handlers::recognize_audio))
        .route("/search-song", post(handlers::search_song))
        .route("/extract-text", post(handlers::extract_text))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handlers::health))
        .route("/", get(handlers::root))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    // Per-request timeouts come from callers; only bound the connect phase.
    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let state = AppState::from_config(&config, http_client);
    tracing::info!(
        pool = ?state.router.pool_names(),
        image_provider = ?state.router.image_provider_name(),
        songs = state.songs.is_some(),
        ocr = state.extractor.is_some(),
        "Services configured"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting omnicron gateway");

    axum::serve(listener, app).await?;

    Ok(())
}
