//! Gateway error responses.
//!
//! Every failure leaves the gateway as `{ "error": "<message>" }` with a
//! stable message per category. Details stay in the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::proxy::ProxyError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("API key is required")]
    MissingKey,

    #[error("Invalid API Key")]
    InvalidKey,

    /// Key store failure. Never reported as an invalid key.
    #[error("Internal server error")]
    Storage,

    #[error("Error retrieving Ollama server port")]
    ConfigMissing,

    #[error("Error making request to Ollama API")]
    Backend,

    /// The listener serving this request was closed before it finished.
    #[error("Service unavailable")]
    ListenerClosed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody | ApiError::MissingKey => StatusCode::BAD_REQUEST,
            ApiError::InvalidKey => StatusCode::FORBIDDEN,
            ApiError::Storage | ApiError::ConfigMissing | ApiError::Backend => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ListenerClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::ConfigMissing(_) => ApiError::ConfigMissing,
            ProxyError::BackendUnavailable(_) => ApiError::Backend,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
