pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod http;
pub mod hub;
pub mod proxy;
pub mod state;
pub mod transform;

pub use state::AppState;

use axum::routing::{delete, get};
use axum::Router;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz))
        .route("/invalidate", delete(http::invalidate_handler))
        .route("/lastInvalidation", get(http::last_invalidation_handler))
        .route("/*path", get(http::proxy_handler))
        .with_state(state)
}
