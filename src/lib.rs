use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core rules: who sees which post, who may change it.
pub mod policy;
pub mod visibility;

// Application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod pages;
pub mod pagination;
pub mod repository;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generated OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index, handlers::category_posts, handlers::profile, handlers::post_detail,
        handlers::create_post, handlers::edit_post_form, handlers::edit_post,
        handlers::delete_post, handlers::add_comment, handlers::edit_comment_form,
        handlers::edit_comment, handlers::delete_comment, handlers::edit_profile_form,
        handlers::edit_profile, handlers::get_admin_categories, handlers::create_category,
        handlers::update_category, handlers::get_admin_locations, handlers::create_location,
        handlers::delete_category, handlers::update_location, handlers::delete_location,
        handlers::get_admin_posts, handlers::moderate_post, handlers::get_admin_comments,
        handlers::delete_admin_comment, pages::about, pages::rules
    ),
    components(
        schemas(
            models::Post, models::Comment, models::Category, models::Location, models::User,
            models::UserProfile, models::AuthorSummary, models::CategorySummary,
            models::LocationSummary, models::PostDetail, models::CommentForm,
            models::FeedResponse, models::CategoryFeedResponse, models::ProfileFeedResponse,
            models::CreatePostRequest, models::UpdatePostRequest, models::CommentRequest,
            models::UpdateProfileRequest, models::CreateCategoryRequest,
            models::UpdateCategoryRequest, models::LocationRequest,
            models::ModeratePostRequest, models::StaticPage, pagination::PageInfo,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "blogicum", description = "Blogicum blog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container of shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// The loaded environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors (AuthUser, Viewer) pull individual components from AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. If `AuthUser` cannot be
/// resolved, its rejection (a redirect to the login page) is returned and the
/// handler never runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Staff checks happen inside the handlers.
        .nest("/admin", admin::admin_routes())
        .fallback(pages::not_found)
        .with_state(state);

    // Observability and correlation layers, outermost first.
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
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // Inside the trace span, so panics are logged with their request id.
                .layer(CatchPanicLayer::custom(pages::server_error)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags every log line of a request with its method,
/// URI and `x-request-id`.
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
