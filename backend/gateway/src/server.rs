//! Gateway router and shared request state.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use llamagate_security::Authorizer;

use crate::generate::generate;
use crate::health_api::get_health;
use crate::proxy::ForwardingProxy;

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub proxy: Arc<ForwardingProxy>,
}

/// Build the gateway routes. The router is cheap to clone, so each listener
/// the gateway binds gets its own copy.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
