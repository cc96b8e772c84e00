#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use learnhub::{
    AppConfig, AppState, create_router,
    identity::{
        IdTokenClaims, IdentityProvider, IdentityState, IssuedSession, JwtIdentityProvider,
        ProviderError, SESSION_ISSUER, SessionTokenClaims, Verification,
    },
    models::{Profile, Role},
    repository::{InMemoryRepository, RepositoryState},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ID_SECRET: &str = "test-identity-secret-0123456789";
pub const SESSION_SECRET: &str = "test-session-secret-0123456789";
pub const FIVE_DAYS: Duration = Duration::from_secs(60 * 60 * 24 * 5);

// --- Tokens ---

/// An identity token as the identity provider would hand it to the client.
pub fn id_token(uid: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = IdTokenClaims {
        sub: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ID_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A session credential signed with `secret`, bypassing the provider.
pub fn raw_session(uid: &str, role: Role, exp_offset_secs: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = SessionTokenClaims {
        sub: uid.to_string(),
        role,
        iss: SESSION_ISSUER.to_string(),
        iat: now,
        exp: now + exp_offset_secs,
        jti: Uuid::new_v4(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Keeps the header and payload of `payload_from` but the signature of `signature_from`.
pub fn splice(payload_from: &str, signature_from: &str) -> String {
    let head: Vec<&str> = payload_from.split('.').collect();
    let sig = signature_from.rsplit('.').next().unwrap();
    format!("{}.{}.{}", head[0], head[1], sig)
}

// --- Fixtures ---

pub fn profile(uid: &str, role: Role) -> Profile {
    let mut p = Profile::new(uid, format!("{uid}@example.com"), Utc::now());
    p.role = role;
    p
}

pub fn repo_with(profiles: &[(&str, Role)]) -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::with_profiles(
        profiles.iter().map(|(uid, role)| profile(uid, *role)),
    ))
}

pub fn provider(repo: Arc<InMemoryRepository>) -> JwtIdentityProvider {
    JwtIdentityProvider::new(repo as RepositoryState, ID_SECRET, SESSION_SECRET)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        identity_token_secret: ID_SECRET.to_string(),
        session_secret: SESSION_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn app_state(repo: Arc<InMemoryRepository>) -> AppState {
    let identity = Arc::new(provider(repo.clone())) as IdentityState;
    AppState::new(repo as RepositoryState, identity, test_config())
}

pub fn app(repo: Arc<InMemoryRepository>) -> Router {
    create_router(app_state(repo))
}

/// Mints a real session for `uid` through the provider.
pub async fn session_for(repo: Arc<InMemoryRepository>, uid: &str) -> String {
    provider(repo)
        .create_session(&id_token(uid, 3600), FIVE_DAYS)
        .await
        .unwrap()
        .credential
}

// --- Requests ---

pub fn request(method: Method, uri: &str, session: Option<&str>, json: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cred) = session {
        builder = builder.header(header::COOKIE, format!("session={cred}"));
    }
    match json {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(router: Router, req: Request<Body>) -> Response<Body> {
    router.oneshot(req).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

// --- Provider doubles ---

/// Wraps the real provider and counts verification calls.
pub struct CountingProvider {
    inner: JwtIdentityProvider,
    verify_calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(repo: Arc<InMemoryRepository>) -> Self {
        Self {
            inner: provider(repo),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for CountingProvider {
    async fn create_session(
        &self,
        id_token: &str,
        expires_in: Duration,
    ) -> Result<IssuedSession, ProviderError> {
        self.inner.create_session(id_token, expires_in).await
    }

    async fn verify_session(&self, credential: &str, check_revoked: bool) -> Verification {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_session(credential, check_revoked).await
    }

    async fn revoke_sessions(&self, uid: &str) -> Result<(), ProviderError> {
        self.inner.revoke_sessions(uid).await
    }
}
