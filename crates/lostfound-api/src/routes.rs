use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::items;
use crate::middleware::require_auth;
use crate::notifications;

/// Full HTTP surface. Listing and auth are public; submissions, closing and
/// notifications need a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/items/lost", get(items::list_lost))
        .route("/api/items/found", get(items::list_found))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/items/lost", post(items::report_lost))
        .route("/api/items/found", post(items::report_found))
        .route("/api/items/{item_id}/close", put(items::close_item))
        .route("/api/items/notifications", get(notifications::get_notifications))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
