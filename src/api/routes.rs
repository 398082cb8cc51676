//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown paths
async fn fallback_handler(uri: axum::http::Uri) -> (StatusCode, Json<handlers::ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(handlers::ApiError {
            error: format!("Not Found: {}", uri.path()),
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket event stream
        .route("/ws", get(ws_handler))
        // Ledger
        .route("/api/ledger", get(handlers::get_ledger_info))
        .route("/api/operations", get(handlers::list_operations))
        .route("/api/operations/{id}", get(handlers::get_operation))
        .route(
            "/api/principals/{principal}/nonce",
            get(handlers::get_nonce),
        )
        // Signed calls
        .route("/api/calls", post(handlers::submit_call))
        // Treasury
        .route("/api/treasury", get(handlers::get_treasury))
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_is_json_404() {
        let uri: axum::http::Uri = "/api/nope".parse().unwrap();
        let (status, Json(body)) = fallback_handler(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.contains("/api/nope"));
    }
}
