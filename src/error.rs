//! Error types for omnicron.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for omnicron operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for omnicron.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid model '{model}'. Only {allowed} are allowed")]
    InvalidModel { model: String, allowed: String },

    #[error("All {attempts} providers failed")]
    ProviderExhausted { attempts: usize },

    #[error("Failed to download image: {0}")]
    DownloadFailed(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Error {service}: {message}")]
    Service { service: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status the error maps to at the boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidModel { .. }
            | Error::ProviderExhausted { .. }
            | Error::DownloadFailed(_)
            | Error::Upstream(_)
            | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Service { .. } | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "omnicron_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_400() {
        let errors = [
            Error::InvalidModel {
                model: "llama".to_string(),
                allowed: "'gpt-4' or 'gpt-3.5-turbo'".to_string(),
            },
            Error::ProviderExhausted { attempts: 3 },
            Error::DownloadFailed("404 Not Found".to_string()),
            Error::Upstream("boom".to_string()),
            Error::BadRequest("messages must not be empty".to_string()),
        ];
        for error in errors {
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST, "{}", error);
        }
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let error = Error::Unauthorized("Provide Api Key".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_service_error_maps_to_500() {
        let error = Error::Service {
            service: "searching song".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "Error searching song: connection refused");
    }

    #[test]
    fn test_invalid_model_message_names_allow_list() {
        let error = Error::InvalidModel {
            model: "llama".to_string(),
            allowed: "'gpt-4' or 'gpt-3.5-turbo'".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("llama"));
        assert!(message.contains("'gpt-4' or 'gpt-3.5-turbo'"));
    }
}
