use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    identity::{IdentityState, Verification},
    policy::{self, ProtectedPaths, RoutePolicy},
    session::{self, SessionUser},
};

/// Where every failed or missing session is sent.
pub const LOGIN_PATH: &str = "/login";

/// GateDecision
///
/// Terminal state of one pass through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The path is not on the protected list; the gate did nothing.
    Bypass,
    /// Session verified and every applicable policy satisfied.
    Allow(SessionUser),
    /// Send the client elsewhere: `/login` or a policy fallback.
    Redirect(&'static str),
}

/// RequestGate
///
/// Enforces "must have a valid session" and "must satisfy path policy" for the
/// configured protected prefixes. Holds its identity provider handle; nothing is
/// cached between requests.
#[derive(Clone)]
pub struct RequestGate {
    identity: IdentityState,
    protected: ProtectedPaths,
    policies: &'static [RoutePolicy],
}

impl RequestGate {
    pub fn new(identity: IdentityState, protected: ProtectedPaths) -> Self {
        Self {
            identity,
            protected,
            policies: policy::ROUTE_POLICIES,
        }
    }

    /// check
    ///
    /// Runs the per-request state machine for `path` with the credential found in
    /// the `session` cookie, if any.
    pub async fn check(&self, path: &str, credential: Option<&str>) -> GateDecision {
        if !self.protected.matches(path) {
            return GateDecision::Bypass;
        }

        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            tracing::debug!(path, "no session cookie, redirecting to login");
            return GateDecision::Redirect(LOGIN_PATH);
        };

        let verification = self.identity.verify_session(credential, true).await;
        self.decide(path, verification)
    }

    /// Pure second half of `check`: maps a verification outcome to a decision.
    pub fn decide(&self, path: &str, verification: Verification) -> GateDecision {
        let claims = match verification {
            Verification::Verified(claims) => claims,
            Verification::Expired => {
                tracing::debug!(path, "session expired");
                return GateDecision::Redirect(LOGIN_PATH);
            }
            Verification::Invalid => {
                tracing::debug!(path, "session invalid");
                return GateDecision::Redirect(LOGIN_PATH);
            }
            Verification::Revoked => {
                tracing::info!(path, "revoked session presented");
                return GateDecision::Redirect(LOGIN_PATH);
            }
            Verification::UpstreamError(detail) => {
                tracing::error!(path, error = %detail, "session verification failed upstream");
                return GateDecision::Redirect(LOGIN_PATH);
            }
        };

        if let Some(violated) = policy::first_violation(self.policies, path, claims.role) {
            tracing::debug!(
                path,
                uid = %claims.uid,
                role = %claims.role,
                policy = violated.name,
                "role does not satisfy route policy"
            );
            return GateDecision::Redirect(violated.fallback);
        }

        GateDecision::Allow(SessionUser {
            uid: claims.uid,
            role: claims.role,
        })
    }
}

/// request_gate
///
/// Axum middleware wrapping the whole router. Allowed requests continue with the
/// verified `SessionUser` in their extensions.
pub async fn request_gate(
    State(gate): State<RequestGate>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let credential = session::credential_from(&jar);

    match gate.check(&path, credential.as_deref()).await {
        GateDecision::Bypass => next.run(request).await,
        GateDecision::Allow(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        GateDecision::Redirect(location) => Redirect::temporary(location).into_response(),
    }
}
