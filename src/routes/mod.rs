pub mod auth;
pub mod posts;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.uploads.max_bytes() + MULTIPART_OVERHEAD;
    let uploads = ServeDir::new(state.uploads.root());

    Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(users::router())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
