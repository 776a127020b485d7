use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{diagnostics, health_check, session_create, session_invite};
use crate::registry::SessionRegistry;
use crate::routes::auth_middleware::auth_middleware;

/// Create API routes
pub fn create_api_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::<Arc<SessionRegistry>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/sessions", post(session_create))
        .route("/v1/sessions/:session_id/invitations", post(session_invite))
        .route_layer(middleware::from_fn(auth_middleware)) // Applies to all routes added above
        .route("/v1/health", get(health_check))
        .with_state(registry)
}
