//! C7 HTTP surface: router construction. Handlers are thin adapters over
//! the core pipeline; no business logic lives here.

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

pub use state::AppState;

const PAYMENTS_BODY_LIMIT_BYTES: usize = 8 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/payments",
            post(handlers::create_payment).layer(DefaultBodyLimit::max(PAYMENTS_BODY_LIMIT_BYTES)),
        )
        .route("/payments-summary", get(handlers::payments_summary))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state)
}
