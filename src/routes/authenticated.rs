use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints for any signed-in caller, regardless of role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's id, email and role, used by the admin UI to shape its menus.
        .route("/me", get(handlers::get_me))
}
