use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to any client. The two auth endpoints are the Session Issuer:
/// login mints the `session` cookie, logout clears it.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Body `{ idToken }`; sets the session cookie on success.
        .route("/api/auth/login", post(handlers::issue_session))
        // POST /api/auth/logout
        // Always succeeds; overwrites the cookie with an expired empty one.
        .route("/api/auth/logout", post(handlers::revoke_session))
        // GET /api/subscription/plans
        .route("/api/subscription/plans", get(handlers::list_plans))
}
