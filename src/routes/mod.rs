//! Route gateway: merges every endpoint group's subrouter, installs the
//! unmatched-route and wrong-method fallbacks, CORS and request tracing,
//! and binds the store.

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::store::SharedStore;

mod data;
mod health;
mod login;
mod records;
mod users;

// ---

pub fn router(store: SharedStore) -> Router {
    // ---
    Router::new()
        .merge(login::router())
        .merge(data::router())
        .merge(records::router())
        .merge(users::router())
        .merge(health::router())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(store)
}

/// Any origin, method and header.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found() -> AppError {
    AppError::unknown_endpoint()
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
