use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod policy;
pub mod repository;
pub mod session;
pub mod subscription;

pub mod routes;
use routes::{admin, authenticated, pages, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use gate::RequestGate;
pub use identity::{IdentityState, JwtIdentityProvider};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_session, handlers::revoke_session, handlers::get_user,
        handlers::update_user, handlers::list_plans, handlers::change_plan,
        handlers::dashboard, handlers::dashboard_profile, handlers::premium_content,
        handlers::admin_stats, handlers::admin_revoke_user
    ),
    components(
        schemas(
            models::Role, models::IssueSessionRequest, models::UpdateProfileRequest,
            models::ChangePlanRequest, models::SuccessResponse, models::ErrorResponse,
            models::ProfileView, models::UserResponse, models::PlanChangedResponse,
            models::Plan, models::DashboardSummary, models::PremiumContent, models::AdminStats,
        )
    ),
    tags(
        (name = "learnhub", description = "Session-gated learning platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single immutable container of injected services, cloned into every request.
/// Tests build it with in-memory fakes; `main` with Postgres and the JWT provider.
#[derive(Clone)]
pub struct AppState {
    /// Profile document store.
    pub repo: RepositoryState,
    /// Identity backend: session minting, verification, revocation.
    pub identity: IdentityState,
    /// The request gate, sharing `identity`.
    pub gate: RequestGate,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, identity: IdentityState, config: AppConfig) -> Self {
        let gate = RequestGate::new(
            identity.clone(),
            policy::ProtectedPaths::new(config.protected_prefixes.iter().cloned()),
        );
        Self {
            repo,
            identity,
            gate,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for RequestGate {
    fn from_ref(app_state: &AppState) -> RequestGate {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, puts the request gate in front of all of them and wraps
/// the result in the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let gate = state.gate.clone();

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(pages::page_routes())
        .nest("/admin", admin::admin_routes())
        .with_state(state)
        // The gate sees every request, unmatched paths included, and acts only on
        // the protected prefixes.
        .layer(middleware::from_fn_with_state(gate, gate::request_gate));

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the `x-request-id`, so every log
/// line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
