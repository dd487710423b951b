use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// The CMS API. Minimum roles come from the permission table:
/// VIEWER may read, EDITOR may create, update and reorder content, ADMIN may also delete,
/// bulk-delete, manage users, export and import.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/projects
        .route(
            "/projects",
            get(handlers::admin_list_projects).post(handlers::create_project),
        )
        // POST /admin/projects/reorder
        // Moves one project a single slot up or down in the public list.
        .route("/projects/reorder", post(handlers::reorder_project))
        // POST /admin/projects/bulk-delete
        .route("/projects/bulk-delete", post(handlers::bulk_delete_projects))
        // PUT/DELETE /admin/projects/{id}
        .route(
            "/projects/{id}",
            put(handlers::update_project).delete(handlers::delete_project),
        )
        // GET/POST /admin/users
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        // DELETE /admin/users/{id}
        // Refuses to delete the caller's own account.
        .route("/users/{id}", axum::routing::delete(handlers::delete_user))
        // PUT /admin/users/{id}/role
        .route("/users/{id}/role", put(handlers::update_user_role))
        // GET /admin/export
        .route("/export", get(handlers::export_data))
        // POST /admin/import
        // Restores projects from an export bundle in one transaction.
        .route("/import", post(handlers::import_data))
}
