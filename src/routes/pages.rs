use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Gated pages. The request gate has already verified the session and applied the
/// route policy by the time these handlers run.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route("/dashboard/profile", get(handlers::dashboard_profile))
        // The premium landing page and any depth below it.
        .route("/premium", get(handlers::premium_content))
        .route("/premium/{*path}", get(handlers::premium_content))
}
