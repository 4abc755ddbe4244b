//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Allowance on top of the upload limit for multipart framing and the
/// metadata fields sent with the file.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_size_bytes() + FORM_OVERHEAD;

    Router::new()
        .route("/", get(handlers::index))
        .route("/category", get(handlers::category))
        .route("/search", get(handlers::search_form).post(handlers::search))
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/upload", get(handlers::upload_form).post(handlers::upload))
        .route(
            "/delete",
            get(handlers::delete_form).post(handlers::delete_book),
        )
        .route("/files/{*path}", get(handlers::download))
        .route("/api/stats", get(handlers::api_stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
