pub mod detect;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(detect::routes())
}

/// Full application: routes, body cap, tracing and CORS for browser clients
pub fn app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    build_routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn index() -> &'static str {
    "Running"
}

async fn health() -> &'static str {
    "ok"
}
