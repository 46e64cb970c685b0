//! Gateway Health API
//!
//! `GET /health?apikey=<key>`: a keyed liveness probe.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::generate::check_key;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub apikey: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /health`
pub async fn get_health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> Result<Json<HealthReport>, ApiError> {
    check_key(&state, "/health", query.apikey.as_deref()).await?;

    Ok(Json(HealthReport {
        status: "API is healthy".into(),
        timestamp: Utc::now(),
    }))
}
