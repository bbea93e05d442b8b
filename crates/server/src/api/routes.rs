use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{discovery, handlers, middleware::metrics_middleware, webhook};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let webhook_path = config.server.webhook_path.clone();

    // API routes
    let mut api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config));

    if config.discovery.enabled {
        api_routes = api_routes
            .route("/discover/libraries", get(discovery::list_libraries))
            .route("/discover/validate-paths", post(discovery::validate_paths));
    }

    Router::new()
        .nest("/api/v1", api_routes)
        .route(&webhook_path, post(webhook::receive))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
