use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{ProfileUpdate, Role},
    repository::{RepositoryError, RepositoryState},
};

/// Issuer stamped into every session credential, so an identity token signed with
/// the wrong secret can never double as a session.
pub const SESSION_ISSUER: &str = "learnhub-session";

/// IdTokenClaims
///
/// Payload of the short-lived identity token handed out by the identity provider
/// after a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject: the provider's user id, also the profile key.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// SessionTokenClaims
///
/// Payload of the long-lived session credential carried in the `session` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    pub sub: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique id of this session.
    pub jti: Uuid,
}

/// SessionClaims
///
/// What a successful verification yields.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClaims {
    pub uid: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Verification
///
/// Outcome of checking a session credential. Expected auth failures and upstream
/// failures are distinct variants so callers match instead of catching.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Verified(SessionClaims),
    Expired,
    Invalid,
    Revoked,
    UpstreamError(String),
}

/// IssuedSession
///
/// A freshly minted credential plus the identity it was minted for.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub credential: String,
    pub uid: String,
    pub email: Option<String>,
    pub claims: SessionClaims,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity token is malformed or carries a bad signature: {0}")]
    InvalidIdToken(String),
    #[error("identity token has expired")]
    ExpiredIdToken,
    #[error("sessions for subject {0} were revoked")]
    Revoked(String),
    #[error("no account for subject {0}")]
    UnknownSubject(String),
    #[error("session lifetime out of range: {0:?}")]
    InvalidLifetime(Duration),
    #[error("failed to sign session credential: {0}")]
    Signing(String),
    #[error(transparent)]
    Upstream(#[from] RepositoryError),
}

/// IdentityProvider
///
/// The identity backend's admin surface: mint a session from an identity token,
/// verify a session, revoke a subject's sessions. Injected into `AppState` so the
/// issuer, the gate and the tests can swap implementations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies `id_token` and mints a session credential valid for `expires_in`.
    async fn create_session(
        &self,
        id_token: &str,
        expires_in: Duration,
    ) -> Result<IssuedSession, ProviderError>;

    /// Verifies signature and expiry. With `check_revoked`, also consults the
    /// account state so server-side revocation takes effect immediately.
    async fn verify_session(&self, credential: &str, check_revoked: bool) -> Verification;

    /// Invalidates every session issued to `uid` up to now.
    async fn revoke_sessions(&self, uid: &str) -> Result<(), ProviderError>;
}

pub type IdentityState = Arc<dyn IdentityProvider>;

/// JwtIdentityProvider
///
/// Verifies HS256 identity tokens signed with the secret shared with the identity
/// backend, and mints HS256 session credentials with a separate secret. Account
/// state (role, revocation watermark) lives in the profile repository.
pub struct JwtIdentityProvider {
    repo: RepositoryState,
    id_token_key: DecodingKey,
    session_encoding_key: EncodingKey,
    session_decoding_key: DecodingKey,
}

impl JwtIdentityProvider {
    pub fn new(repo: RepositoryState, identity_token_secret: &str, session_secret: &str) -> Self {
        Self {
            repo,
            id_token_key: DecodingKey::from_secret(identity_token_secret.as_bytes()),
            session_encoding_key: EncodingKey::from_secret(session_secret.as_bytes()),
            session_decoding_key: DecodingKey::from_secret(session_secret.as_bytes()),
        }
    }

    fn verify_id_token(&self, id_token: &str) -> Result<IdTokenClaims, ProviderError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<IdTokenClaims>(id_token, &self.id_token_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ProviderError::ExpiredIdToken,
                _ => ProviderError::InvalidIdToken(e.to_string()),
            })
    }
}

/// Revocation watermarks have one-second resolution, so a session issued in the
/// same second as a revocation counts as revoked.
fn issued_before_watermark(issued_at: i64, watermark: Option<DateTime<Utc>>) -> bool {
    watermark.is_some_and(|w| issued_at <= w.timestamp())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn create_session(
        &self,
        id_token: &str,
        expires_in: Duration,
    ) -> Result<IssuedSession, ProviderError> {
        let identity = self.verify_id_token(id_token)?;

        let profile = self.repo.get_profile(&identity.sub).await?;
        if let Some(profile) = &profile {
            if issued_before_watermark(identity.iat, profile.sessions_valid_after) {
                return Err(ProviderError::Revoked(identity.sub));
            }
        }
        let role = profile.map(|p| p.role).unwrap_or_default();

        let now = Utc::now().timestamp();
        let exp = i64::try_from(expires_in.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or(ProviderError::InvalidLifetime(expires_in))?;
        let claims = SessionTokenClaims {
            sub: identity.sub.clone(),
            role,
            iss: SESSION_ISSUER.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4(),
        };

        let credential = encode(&Header::new(Algorithm::HS256), &claims, &self.session_encoding_key)
            .map_err(|e| ProviderError::Signing(e.to_string()))?;

        tracing::debug!(uid = %claims.sub, session = %claims.jti, "minted session credential");

        Ok(IssuedSession {
            credential,
            uid: identity.sub,
            email: identity.email,
            claims: SessionClaims {
                uid: claims.sub,
                role,
                issued_at: timestamp(claims.iat),
                expires_at: timestamp(claims.exp),
            },
        })
    }

    async fn verify_session(&self, credential: &str, check_revoked: bool) -> Verification {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let token = match decode::<SessionTokenClaims>(credential, &self.session_decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::ExpiredSignature => Verification::Expired,
                    _ => Verification::Invalid,
                };
            }
        };

        let mut claims = SessionClaims {
            uid: token.sub,
            role: token.role,
            issued_at: timestamp(token.iat),
            expires_at: timestamp(token.exp),
        };

        if !check_revoked {
            return Verification::Verified(claims);
        }

        match self.repo.get_profile(&claims.uid).await {
            Err(e) => Verification::UpstreamError(e.to_string()),
            // The account behind the session no longer exists.
            Ok(None) => Verification::Invalid,
            Ok(Some(profile)) => {
                if issued_before_watermark(token.iat, profile.sessions_valid_after) {
                    return Verification::Revoked;
                }
                // Account state is authoritative for the role once it has been loaded.
                claims.role = profile.role;
                Verification::Verified(claims)
            }
        }
    }

    async fn revoke_sessions(&self, uid: &str) -> Result<(), ProviderError> {
        let now = Utc::now();
        let update = ProfileUpdate {
            sessions_valid_after: Some(now),
            ..ProfileUpdate::default()
        };
        match self.repo.update_profile(uid, update, now).await? {
            Some(_) => {
                tracing::info!(uid = %uid, "revoked all sessions");
                Ok(())
            }
            None => Err(ProviderError::UnknownSubject(uid.to_string())),
        }
    }
}
