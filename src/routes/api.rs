use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
///
/// # Endpoints
///
/// `GET /` - Liveness probe
/// `GET|POST /incoming-call` - Call-control document for inbound calls
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route(
            "/incoming-call",
            get(api::incoming_call).post(api::incoming_call),
        )
        .layer(TraceLayer::new_for_http())
}
