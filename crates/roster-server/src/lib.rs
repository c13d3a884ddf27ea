//! Roster server library logic.

pub mod api_users;
pub mod config;
pub mod report;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use report::ErrorReporter;
use roster_users::UserService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
///
/// Handlers depend on the [`UserService`] capability trait, not on the
/// concrete store, so tests swap in an in-memory implementation.
#[derive(Clone)]
pub struct AppState {
    /// The user service the handlers operate through.
    pub users: Arc<dyn UserService>,
    /// Reporter for unexpected errors. No-op unless one is injected.
    pub reporter: Arc<dyn ErrorReporter>,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/users",
            post(api_users::create_user_handler).get(api_users::list_users_handler),
        )
        .route("/users/{id}", get(api_users::get_user_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
