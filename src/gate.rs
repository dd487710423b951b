//! Access control gate.
//!
//! Pure checks over an already-resolved `CallerContext`; nothing in here reads request
//! state or storage. Handlers call `authorize` (or `require_authenticated`) before touching
//! the repository.

use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::{CallerContext, Principal},
    error::AppError,
    models::Role,
    permissions::{self, Action, Resource},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no valid session")]
    Unauthenticated,

    #[error("role not permitted")]
    Forbidden,
}

pub fn require_authenticated(ctx: &CallerContext) -> Result<Principal, AuthError> {
    ctx.principal().cloned().ok_or(AuthError::Unauthenticated)
}

/// require_role
///
/// Authenticates, then checks membership in `allowed` literally: no role is implied by
/// another here. An empty set admits nobody.
pub fn require_role(ctx: &CallerContext, allowed: &[Role]) -> Result<Principal, AuthError> {
    let principal = require_authenticated(ctx)?;

    if allowed.contains(&principal.role) {
        Ok(principal)
    } else {
        tracing::debug!(
            user_id = %principal.id,
            role = ?principal.role,
            allowed = ?allowed,
            "role check rejected caller"
        );
        Err(AuthError::Forbidden)
    }
}

/// authorize
///
/// Looks the operation up in the permission table and runs `require_role` with the
/// resulting set.
pub fn authorize(
    ctx: &CallerContext,
    resource: Resource,
    action: Action,
) -> Result<Principal, AuthError> {
    require_role(ctx, &permissions::allowed_roles(resource, action))
}

/// Guards user deletion against the caller removing their own account.
pub fn ensure_not_self(principal: &Principal, target_id: Uuid) -> Result<(), AppError> {
    if principal.id == target_id {
        Err(AppError::SelfDeletion)
    } else {
        Ok(())
    }
}
