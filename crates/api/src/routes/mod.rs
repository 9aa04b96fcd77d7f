//! API routes

pub mod health;
pub mod sessions;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{state::AppState, websocket::ws_handler};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Read-only session surface for the agent dashboard
    let api_routes = Router::new()
        .route("/support/sessions", get(sessions::list_sessions))
        .route("/support/sessions/:session_id", get(sessions::get_session))
        .route(
            "/support/sessions/:session_id/messages",
            get(sessions::list_messages),
        );

    let websocket_routes = Router::new().route("/ws/support", get(ws_handler));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_routes)
        .merge(websocket_routes)
        // the widget is embedded on booking pages across origins
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
