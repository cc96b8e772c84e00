use crate::{
    AppState,
    error::{ApiError, AppJson},
    identity::ProviderError,
    models::{
        AdminStats, ChangePlanRequest, DashboardSummary, IssueSessionRequest, Plan,
        PlanChangedResponse, PremiumContent, ProfileUpdate, ProfileView, SuccessResponse,
        UpdateProfileRequest, UserResponse,
    },
    policy,
    session::{self, SessionUser},
    subscription,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::Uri,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

// --- Session Issuer ---

/// issue_session
///
/// [Public Route] Exchanges a short-lived identity token for the `session` cookie.
///
/// The credential only ever travels in the `Set-Cookie` header. Any failure, an
/// unreadable body included, is logged and answered with a generic 500.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = IssueSessionRequest,
    responses(
        (status = 200, description = "Session cookie set", body = SuccessResponse),
        (status = 500, description = "Session could not be issued", body = crate::models::ErrorResponse)
    )
)]
pub async fn issue_session(
    State(state): State<AppState>,
    payload: Result<Json<IssueSessionRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SuccessResponse>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        ApiError::Upstream(format!("unreadable sign-in body: {}", rejection.body_text()))
    })?;

    let issued = session::issue(
        state.identity.as_ref(),
        state.repo.as_ref(),
        &payload.id_token,
        state.config.session_ttl,
    )
    .await?;

    let cookie = session::session_cookie(
        issued.credential,
        state.config.session_ttl,
        state.config.secure_cookies(),
    );
    tracing::info!(uid = %issued.uid, "session issued");

    Ok((CookieJar::new().add(cookie), Json(SuccessResponse::ok())))
}

/// revoke_session
///
/// [Public Route] Logs the client out by overwriting the session cookie with an
/// empty, already-expired one. Idempotent and infallible.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session cookie cleared", body = SuccessResponse))
)]
pub async fn revoke_session() -> (CookieJar, Json<SuccessResponse>) {
    (
        CookieJar::new().add(session::cleared_session_cookie()),
        Json(SuccessResponse::ok()),
    )
}

// --- Profile API ---

/// get_user
///
/// [Authenticated Route] Returns the caller's profile.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state
        .repo
        .get_profile(&user.uid)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(UserResponse {
        user: ProfileView::from(profile),
    }))
}

/// update_user
///
/// [Authenticated Route] Changes the caller's display name.
#[utoipa::path(
    put,
    path = "/api/user",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = SuccessResponse),
        (status = 400, description = "Empty display name or unreadable body"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    user: SessionUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("Display name must not be empty".to_string()));
    }

    let update = ProfileUpdate {
        display_name: Some(display_name.to_string()),
        ..ProfileUpdate::default()
    };
    state
        .repo
        .update_profile(&user.uid, update, Utc::now())
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(SuccessResponse::ok()))
}

// --- Subscription ---

/// list_plans
///
/// [Public Route] The subscription catalog.
#[utoipa::path(
    get,
    path = "/api/subscription/plans",
    responses((status = 200, description = "Plans", body = [Plan]))
)]
pub async fn list_plans() -> Json<Vec<Plan>> {
    Json(subscription::plans())
}

/// change_plan
///
/// [Authenticated Route] Switches the caller to another plan. Payment is simulated:
/// the role on the profile is overwritten directly and takes effect on the next
/// verified request.
#[utoipa::path(
    post,
    path = "/api/subscription",
    request_body = ChangePlanRequest,
    responses(
        (status = 200, description = "Plan changed", body = PlanChangedResponse),
        (status = 400, description = "Unknown plan or unreadable body"),
        (status = 409, description = "Already on this plan")
    )
)]
pub async fn change_plan(
    user: SessionUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePlanRequest>,
) -> Result<Json<PlanChangedResponse>, ApiError> {
    let profile = state
        .repo
        .get_profile(&user.uid)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let target = subscription::validate_plan_change(profile.role, &payload.plan_id)?;

    let update = ProfileUpdate {
        role: Some(target),
        ..ProfileUpdate::default()
    };
    state
        .repo
        .update_profile(&user.uid, update, Utc::now())
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    tracing::info!(uid = %user.uid, from = %profile.role, to = %target, "plan changed");

    Ok(Json(PlanChangedResponse {
        success: true,
        role: target,
    }))
}

// --- Gated Pages ---

/// dashboard
///
/// [Gated Route] Summary of the verified session.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard", body = DashboardSummary))
)]
pub async fn dashboard(user: SessionUser) -> Json<DashboardSummary> {
    Json(DashboardSummary {
        premium_access: policy::has_premium_access(user.role),
        uid: user.uid,
        role: user.role,
    })
}

/// dashboard_profile
///
/// [Gated Route] The caller's profile, as rendered by the profile page.
#[utoipa::path(
    get,
    path = "/dashboard/profile",
    responses((status = 200, description = "Profile", body = ProfileView))
)]
pub async fn dashboard_profile(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = state
        .repo
        .get_profile(&user.uid)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(ProfileView::from(profile)))
}

/// premium_content
///
/// [Gated Route] Any page under `/premium`. Reaching the handler means the gate let
/// the role through; the check is repeated against the same policy table in case the
/// prefix is ever dropped from the gate's matcher.
#[utoipa::path(
    get,
    path = "/premium/{path}",
    params(("path" = String, Path, description = "Premium page path")),
    responses((status = 200, description = "Unlocked", body = PremiumContent))
)]
pub async fn premium_content(user: SessionUser, uri: Uri) -> Result<Json<PremiumContent>, ApiError> {
    if !policy::is_allowed(uri.path(), user.role) {
        return Err(ApiError::Forbidden("Premium subscription required"));
    }
    Ok(Json(PremiumContent {
        path: uri.path().to_string(),
        unlocked: true,
    }))
}

/// admin_stats
///
/// [Admin Route] Profile counts per role.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminStats))
)]
pub async fn admin_stats(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<AdminStats>, ApiError> {
    if !user.role.is_admin() {
        return Err(ApiError::Forbidden("Admin only"));
    }
    Ok(Json(state.repo.get_stats().await?))
}

/// admin_revoke_user
///
/// [Admin Route] Invalidates every session of `uid` server-side. The next gated
/// navigation by that user is sent to `/login`.
#[utoipa::path(
    post,
    path = "/admin/users/{uid}/revoke",
    params(("uid" = String, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Revoked", body = SuccessResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn admin_revoke_user(
    user: SessionUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !user.role.is_admin() {
        return Err(ApiError::Forbidden("Admin only"));
    }
    match state.identity.revoke_sessions(&uid).await {
        Ok(()) => {
            tracing::info!(admin = %user.uid, target = %uid, "sessions revoked by admin");
            Ok(Json(SuccessResponse::ok()))
        }
        Err(ProviderError::UnknownSubject(_)) => Err(ApiError::NotFound("User not found")),
        Err(e) => Err(e.into()),
    }
}
