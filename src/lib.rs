use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue},
    routing::get,
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

// Core application services and components.
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;

// Module for routing, one sub-module per resource.
pub mod routes;
use routes::{auth as auth_routes, comments, posts, tags, users};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point.
pub use cache::{CacheClient, CacheState};
pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application. It aggregates all API paths and data schemas decorated with
/// the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros. The
/// resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::test_token,
        handlers::list_users, handlers::create_user, handlers::read_user_me,
        handlers::read_user, handlers::update_user,
        handlers::read_posts, handlers::create_post, handlers::read_post,
        handlers::update_post, handlers::delete_post,
        handlers::read_comments, handlers::create_comment, handlers::read_comment,
        handlers::update_comment, handlers::delete_comment,
        handlers::read_tags, handlers::create_tag, handlers::read_tag,
        handlers::update_tag, handlers::delete_tag,
    ),
    components(
        schemas(
            models::UserProfile, models::CreateUserRequest, models::UpdateUserRequest,
            models::PostResponse, models::CreatePostRequest, models::UpdatePostRequest,
            models::CommentResponse, models::CreateCommentRequest, models::UpdateCommentRequest,
            models::Tag, models::CreateTagRequest, models::UpdateTagRequest,
            models::LoginRequest, models::TokenResponse,
        )
    ),
    tags(
        (name = "blog-api", description = "Blog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all essential
/// application services and configuration, shared across all incoming
/// requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Cache Layer: the injected Redis client (currently infrastructure-only).
    pub cache: CacheState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors to selectively pull components from
// the shared AppState (the auth extractors need the repository and config
// without dragging the whole state along).

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CacheState {
    fn from_ref(app_state: &AppState) -> CacheState {
        app_state.cache.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// Builds the CORS layer from configuration. An empty origin list (the local
/// default) allows everything; a configured list restricts to those origins.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(origins)
        .allow_headers(Any)
}

/// create_router
///
/// Assembles the application's entire routing structure, applies the
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // The versioned API surface, one router per resource. Handlers carry
    // their own auth requirements via extractors, so no blanket middleware
    // is layered here.
    let api = Router::new()
        .nest("/auth", auth_routes::auth_routes())
        .nest("/users", users::user_routes())
        .nest("/posts", posts::post_routes())
        .nest("/comments", comments::comment_routes())
        .nest("/tags", tags::tag_routes());

    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Unauthenticated liveness probe for monitors and load balancers.
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", api)
        .with_state(state);

    // Observability and correlation layers, applied outermost.
    base_router
        .layer(
            ServiceBuilder::new()
                // Request ID generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // Request tracing: wraps the request/response lifecycle in a span
                // correlated by the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Request ID propagation: returns x-request-id to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the `TraceLayer` span: extracts the `x-request-id` header (if
/// present) and includes it alongside the HTTP method and URI so every log
/// line for a single request is correlated by a unique id.
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
