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

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod ordering;
pub mod permissions;
pub mod repository;
pub mod revalidate;

// Routing split (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use revalidate::{HttpRevalidator, RecordingRevalidator, RevalidatorState};

/// ApiDoc
///
/// OpenAPI document for the whole API, served at `/api-docs/openapi.json` and browsable
/// through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_projects, handlers::list_featured_projects, handlers::get_project_by_slug,
        handlers::get_me, handlers::admin_list_projects, handlers::create_project,
        handlers::update_project, handlers::delete_project, handlers::bulk_delete_projects,
        handlers::reorder_project, handlers::list_users, handlers::create_user,
        handlers::update_user_role, handlers::delete_user, handlers::export_data,
        handlers::import_data
    ),
    components(
        schemas(
            models::Project, models::User, models::Role, models::CreateProjectRequest,
            models::UpdateProjectRequest, models::ReorderRequest, models::BulkDeleteRequest,
            models::BulkDeleteResponse, models::CreateUserRequest, models::UpdateUserRoleRequest,
            models::SuccessResponse, models::ErrorResponse, models::ExportBundle,
            models::ImportResponse,
            ordering::Direction, auth::Principal,
        )
    ),
    tags(
        (name = "portfolio-cms", description = "Portfolio content management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container of the services every handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Invalidates cached public pages after content changes.
    pub revalidator: RevalidatorState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for RevalidatorState {
    fn from_ref(app_state: &AppState) -> RevalidatorState {
        app_state.revalidator.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles all routes, resolves the caller for every request, and wraps everything in
/// the tracing, request-id and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        // Every handler receives an explicit CallerContext resolved here.
        .layer(middleware::from_fn_with_state(state.clone(), auth::resolve_caller))
        .with_state(state);

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
/// Opens the per-request span, tagged with the `x-request-id` so every log line of one
/// request can be correlated.
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
