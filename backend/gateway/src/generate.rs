//! `POST /generate`: key check, then forward to Ollama.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use llamagate_core::GenerationRequest;
use llamagate_logging::{AccessEvent, AccessLogger};
use llamagate_security::Authorization;

use crate::error::ApiError;
use crate::server::AppState;

const ROUTE: &str = "/generate";

/// Handler for `POST /generate`.
///
/// Any JSON object is accepted; its Ollama fields are not validated here.
/// A request without `apikey` is answered before the key store is consulted.
/// Only an authorized request ever reaches the backend, and the key is
/// stripped from what is forwarded.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| {
        warn!(error = %e, "Rejected request body that is not a JSON object");
        ApiError::InvalidBody
    })?;
    let request = GenerationRequest::from(body);
    debug!(request = ?request, "Request body");

    check_key(&state, ROUTE, request.api_key()).await?;

    let reply = state.proxy.forward(&request.into_backend_payload()).await?;
    Ok(reply.into_response())
}

/// Shared key gate for every keyed route.
pub(crate) async fn check_key(state: &AppState, route: &str, key: Option<&str>) -> Result<(), ApiError> {
    match state.authorizer.authorize(key).await {
        Ok(Authorization::Authorized) => {
            AccessLogger::log(AccessEvent::authorized(route, key.unwrap_or_default()));
            Ok(())
        }
        Ok(Authorization::Unauthorized) => {
            AccessLogger::log(AccessEvent::rejected(route, key.unwrap_or_default()));
            Err(ApiError::InvalidKey)
        }
        Ok(Authorization::MissingKey) => {
            AccessLogger::log(AccessEvent::missing_key(route));
            Err(ApiError::MissingKey)
        }
        Err(e) => {
            error!(error = %e, route, "Error checking API key");
            Err(ApiError::Storage)
        }
    }
}
