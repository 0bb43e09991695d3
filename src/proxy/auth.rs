//! Shared-secret authentication for the API routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::server::AppState;
use crate::config::ApiKey;
use crate::error::{Error, Result};

/// Header carrying the caller's key.
pub const API_KEY_HEADER: &str = "api-key";

/// Compares caller keys against the one configured secret.
#[derive(Debug, Clone)]
pub struct ApiKeyGate {
    secret: ApiKey,
}

impl ApiKeyGate {
    pub fn new(secret: ApiKey) -> Self {
        Self { secret }
    }

    /// Missing and wrong keys are both `Unauthorized`, with different reasons.
    pub fn verify(&self, provided: Option<&str>) -> Result<()> {
        let Some(key) = provided else {
            return Err(Error::Unauthorized("Provide Api Key".to_string()));
        };
        let matches: bool = key
            .as_bytes()
            .ct_eq(self.secret.expose_secret().as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(Error::Unauthorized("Invalid Api Key".to_string()))
        }
    }
}

/// Middleware rejecting requests without the right `Api-Key` header.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let provided = request.headers().get(API_KEY_HEADER).map(|value| {
        // A non-UTF-8 value can never match; treat it as a wrong key.
        value.to_str().unwrap_or("\u{0}")
    });

    if let Err(e) = state.gate.verify(provided) {
        tracing::warn!(path = %request.uri().path(), reason = %e, "Rejected request");
        return Err(e);
    }

    Ok(next.run(request).await)
}
