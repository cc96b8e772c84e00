use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// API endpoints outside the gate's prefixes. Every handler takes a `SessionUser`,
/// whose extractor verifies the cookie (revocation-aware) and answers 401 when it
/// cannot.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /api/user
        // Read the caller's profile, or change its display name.
        .route("/api/user", get(handlers::get_user).put(handlers::update_user))
        // POST /api/subscription
        // Simulated purchase: overwrites the caller's role with the chosen plan.
        .route("/api/subscription", post(handlers::change_plan))
}
