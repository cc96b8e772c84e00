use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use std::time::Duration;

use crate::{
    error::ApiError,
    identity::{IdentityProvider, IdentityState, IssuedSession, Verification},
    models::{Profile, ProfileUpdate, Role},
    repository::Repository,
};

/// Name of the cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "session";

/// session_cookie
///
/// Wraps a credential in the session cookie: HttpOnly, SameSite=Strict, Path=/,
/// Max-Age equal to the session lifetime, and Secure when `secure` is set.
pub fn session_cookie(credential: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, credential))
        .http_only(true)
        .secure(secure)
        .path("/")
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(
            i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        ))
        .build()
}

/// cleared_session_cookie
///
/// An empty session cookie that has already expired, so browsers drop it at once.
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Reads the session credential from a cookie jar. An empty value counts as absent.
pub fn credential_from(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// issue
///
/// Exchanges an identity token for a session credential, then makes sure a
/// profile exists for the subject and stamps its last login. The profile writes
/// are best effort: a failure there is logged and the session is still issued.
pub async fn issue(
    provider: &dyn IdentityProvider,
    repo: &dyn Repository,
    id_token: &str,
    ttl: Duration,
) -> Result<IssuedSession, ApiError> {
    let issued = provider.create_session(id_token, ttl).await?;
    let now = Utc::now();

    let touched = repo
        .update_profile(
            &issued.uid,
            ProfileUpdate {
                last_login: Some(now),
                ..ProfileUpdate::default()
            },
            now,
        )
        .await;

    match touched {
        Ok(Some(_)) => {}
        Ok(None) => {
            let mut profile = Profile::new(
                issued.uid.clone(),
                issued.email.clone().unwrap_or_default(),
                now,
            );
            profile.last_login = Some(now);
            if let Err(e) = repo.set_profile(profile).await {
                tracing::warn!(uid = %issued.uid, error = %e, "could not create profile on first sign-in");
            } else {
                tracing::info!(uid = %issued.uid, "created free profile on first sign-in");
            }
        }
        Err(e) => {
            tracing::warn!(uid = %issued.uid, error = %e, "could not record last login");
        }
    }

    Ok(issued)
}

/// SessionUser
///
/// The identity resolved from a freshly verified session credential. The role is
/// never taken from anything the client sends besides the signed cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub uid: String,
    pub role: Role,
}

/// SessionUser Extractor Implementation
///
/// Used by API routes that live outside the gate's prefixes. On gated routes the
/// gate has already verified this request and left the `SessionUser` in the
/// request extensions; otherwise the cookie is verified here, revocation-aware.
///
/// Rejection: 401 for a missing or bad session, generic 500 on upstream failure.
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SessionUser>() {
            return Ok(user.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let credential =
            credential_from(&jar).ok_or(ApiError::Unauthenticated("Not authenticated"))?;

        let identity = IdentityState::from_ref(state);
        match identity.verify_session(&credential, true).await {
            Verification::Verified(claims) => Ok(SessionUser {
                uid: claims.uid,
                role: claims.role,
            }),
            Verification::Expired | Verification::Invalid | Verification::Revoked => {
                Err(ApiError::Unauthenticated("Not authenticated"))
            }
            Verification::UpstreamError(detail) => Err(ApiError::Upstream(detail)),
        }
    }
}
