//! HTTP route handlers.

pub mod catalogues;
pub mod items;
pub mod stats;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(items::routes())
        .merge(catalogues::routes())
        .merge(stats::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
