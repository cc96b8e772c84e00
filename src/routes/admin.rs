use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Nested under `/admin`. The gate redirects non-admins to `/` before they get here,
/// and each handler checks the role again.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Profile counts per role.
        .route("/stats", get(handlers::admin_stats))
        // POST /admin/users/{uid}/revoke
        // Server-side revocation of every session belonging to `uid`.
        .route("/users/{uid}/revoke", post(handlers::admin_revoke_user))
}
