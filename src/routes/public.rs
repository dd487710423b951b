use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Unauthenticated, read-only endpoints consumed by the public site.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /projects
        // Every project, newest first.
        .route("/projects", get(handlers::list_projects))
        // GET /projects/featured
        // Featured projects, in the same global order.
        .route("/projects/featured", get(handlers::list_featured_projects))
        // GET /projects/{slug}
        // A single project's detail page data.
        .route("/projects/{slug}", get(handlers::get_project_by_slug))
}
