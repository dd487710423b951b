use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, CallerContext, Principal},
    error::{AppError, AppResult},
    gate,
    models::{
        BulkDeleteRequest, BulkDeleteResponse, CreateProjectRequest, CreateUserRequest,
        ErrorResponse, ExportBundle, ImportResponse, NewUser, Project, ReorderRequest,
        SuccessResponse, UpdateProjectRequest, UpdateUserRoleRequest, User,
    },
    permissions::{Action, Resource},
    revalidate,
};

/// Unwraps a JSON body, turning malformed or mistyped payloads into `Validation` errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

// --- Public Handlers ---

/// list_projects
///
/// [Public Route] Every project in display order (newest first).
#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "All projects, newest first", body = [Project]))
)]
pub async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.repo.list_projects().await?))
}

/// list_featured_projects
///
/// [Public Route] Featured projects, filtered out of the global display order.
#[utoipa::path(
    get,
    path = "/projects/featured",
    responses((status = 200, description = "Featured projects, newest first", body = [Project]))
)]
pub async fn list_featured_projects(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.repo.list_featured_projects().await?))
}

#[utoipa::path(
    get,
    path = "/projects/{slug}",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 200, description = "Found", body = Project),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_project_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Project>> {
    state
        .repo
        .get_project_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Project '{}'", slug)))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's resolved identity.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current principal", body = Principal),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    )
)]
pub async fn get_me(ctx: CallerContext) -> AppResult<Json<Principal>> {
    Ok(Json(gate::require_authenticated(&ctx)?))
}

// --- Admin: Projects ---

#[utoipa::path(
    get,
    path = "/admin/projects",
    responses(
        (status = 200, description = "All projects", body = [Project]),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn admin_list_projects(
    ctx: CallerContext,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Project>>> {
    gate::authorize(&ctx, Resource::Project, Action::Read)?;
    Ok(Json(state.repo.list_projects().await?))
}

/// create_project
///
/// [Admin Route] New projects get the current time as `created_at`, so they appear at the
/// top of the list.
#[utoipa::path(
    post,
    path = "/admin/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Created", body = Project),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 409, description = "Slug taken", body = ErrorResponse)
    )
)]
pub async fn create_project(
    ctx: CallerContext,
    State(state): State<AppState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let principal = gate::authorize(&ctx, Resource::Project, Action::Create)?;
    let req = json_body(payload)?;
    req.validate()?;

    let project = state.repo.create_project(req).await?;
    tracing::info!(project_id = %project.id, user_id = %principal.id, "project created");

    state.revalidator.revalidate(revalidate::project_paths(Some(&project.slug)));
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    put,
    path = "/admin/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Updated", body = Project),
        (status = 404, description = "Not Found", body = ErrorResponse),
        (status = 409, description = "Slug taken", body = ErrorResponse)
    )
)]
pub async fn update_project(
    ctx: CallerContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> AppResult<Json<Project>> {
    gate::authorize(&ctx, Resource::Project, Action::Update)?;
    let req = json_body(payload)?;
    req.validate()?;

    // The old slug's detail page must go too when the slug changes.
    let previous_slug = state.repo.get_project(id).await?.map(|p| p.slug);

    let project = state
        .repo
        .update_project(id, req)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {}", id)))?;

    let mut paths = revalidate::project_paths(Some(&project.slug));
    if let Some(old) = previous_slug.filter(|old| *old != project.slug) {
        paths.push(format!("/work/{}", old));
    }
    state.revalidator.revalidate(paths);

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/admin/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_project(
    ctx: CallerContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let principal = gate::authorize(&ctx, Resource::Project, Action::Delete)?;

    let slug = state.repo.get_project(id).await?.map(|p| p.slug);
    if !state.repo.delete_project(id).await? {
        return Err(AppError::NotFound(format!("Project {}", id)));
    }

    tracing::info!(project_id = %id, user_id = %principal.id, "project deleted");
    state.revalidator.revalidate(revalidate::project_paths(slug.as_deref()));
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/admin/projects/bulk-delete",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Deleted", body = BulkDeleteResponse),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn bulk_delete_projects(
    ctx: CallerContext,
    State(state): State<AppState>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> AppResult<Json<BulkDeleteResponse>> {
    let principal = gate::authorize(&ctx, Resource::Project, Action::BulkDelete)?;
    let req = json_body(payload)?;
    if req.ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }

    let deleted = state.repo.delete_projects(&req.ids).await?;
    tracing::info!(
        deleted,
        requested = req.ids.len(),
        user_id = %principal.id,
        "projects bulk-deleted"
    );

    if deleted > 0 {
        state.revalidator.revalidate(revalidate::project_paths(None));
    }
    Ok(Json(BulkDeleteResponse { deleted }))
}

/// reorder_project
///
/// [Admin Route] Moves a project one slot up (newer) or down (older) in the public list by
/// swapping its timestamp with the adjacent project's. The swap is atomic; on success the
/// cached listing pages are invalidated.
#[utoipa::path(
    post,
    path = "/admin/projects/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Swapped", body = SuccessResponse),
        (status = 400, description = "Invalid body or already at the edge", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Unknown project", body = ErrorResponse),
        (status = 409, description = "Neighbor removed during the swap", body = ErrorResponse)
    )
)]
pub async fn reorder_project(
    ctx: CallerContext,
    State(state): State<AppState>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse>> {
    let principal = gate::authorize(&ctx, Resource::Project, Action::Reorder)?;
    let ReorderRequest { id, direction } = json_body(payload)?;

    let plan = state.repo.reorder_project(id, direction).await?;
    tracing::info!(
        project_id = %id,
        neighbor_id = %plan.neighbor.id,
        %direction,
        user_id = %principal.id,
        "project reordered"
    );

    state.revalidator.revalidate(revalidate::project_paths(None));
    Ok(Json(SuccessResponse { success: true }))
}

// --- Admin: Users ---

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn list_users(
    ctx: CallerContext,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<User>>> {
    gate::authorize(&ctx, Resource::User, Action::Read)?;
    Ok(Json(state.repo.list_users().await?))
}

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 409, description = "Email taken", body = ErrorResponse)
    )
)]
pub async fn create_user(
    ctx: CallerContext,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let principal = gate::authorize(&ctx, Resource::User, Action::Create)?;
    let req = json_body(payload)?;
    req.validate()?;

    let new_user = NewUser {
        email: req.email.trim().to_lowercase(),
        password_hash: auth::hash_password(&req.password)?,
        name: req.name,
        role: req.role,
    };

    let user = state.repo.create_user(new_user).await?;
    tracing::info!(
        new_user_id = %user.id,
        role = ?user.role,
        user_id = %principal.id,
        "user created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn update_user_role(
    ctx: CallerContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateUserRoleRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    gate::authorize(&ctx, Resource::User, Action::Update)?;
    let req = json_body(payload)?;

    state
        .repo
        .update_user_role(id, req.role)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
}

/// delete_user
///
/// [Admin Route] Removes a user. An admin can never delete the account they are signed in
/// with.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Attempted self-deletion", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    ctx: CallerContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let principal = gate::authorize(&ctx, Resource::User, Action::Delete)?;
    gate::ensure_not_self(&principal, id)?;

    if !state.repo.delete_user(id).await? {
        return Err(AppError::NotFound(format!("User {}", id)));
    }

    tracing::info!(deleted_user_id = %id, user_id = %principal.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin: Data ---

#[utoipa::path(
    get,
    path = "/admin/export",
    responses(
        (status = 200, description = "Content dump", body = ExportBundle),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn export_data(
    ctx: CallerContext,
    State(state): State<AppState>,
) -> AppResult<Json<ExportBundle>> {
    gate::authorize(&ctx, Resource::Data, Action::Export)?;

    Ok(Json(ExportBundle {
        exported_at: Utc::now(),
        users: state.repo.list_users().await?,
        projects: state.repo.list_projects().await?,
    }))
}

/// import_data
///
/// [Admin Route] Restores the projects of an export bundle, upserting by id and keeping
/// their timestamps, so an export/import cycle reproduces the same order. Users in the
/// bundle are ignored: it carries no credentials to restore them with.
#[utoipa::path(
    post,
    path = "/admin/import",
    request_body = ExportBundle,
    responses(
        (status = 200, description = "Imported", body = ImportResponse),
        (status = 400, description = "Invalid bundle", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 409, description = "Slug owned by another project", body = ErrorResponse)
    )
)]
pub async fn import_data(
    ctx: CallerContext,
    State(state): State<AppState>,
    payload: Result<Json<ExportBundle>, JsonRejection>,
) -> AppResult<Json<ImportResponse>> {
    let principal = gate::authorize(&ctx, Resource::Data, Action::Import)?;
    let bundle = json_body(payload)?;
    bundle.validate()?;

    let imported = state.repo.import_projects(&bundle.projects).await?;
    tracing::info!(
        imported,
        skipped_users = bundle.users.len(),
        user_id = %principal.id,
        "content imported"
    );

    if imported > 0 {
        state.revalidator.revalidate(revalidate::project_paths(None));
    }
    Ok(Json(ImportResponse { imported }))
}
