use std::convert::Infallible;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the session grant issued by the identity provider: a HS256 JWT signed with
/// the shared session secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id in the `users` table.
    pub sub: Uuid,
    /// Expiration Time (exp): the grant is rejected after this instant.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// Principal
///
/// The resolved identity of a caller. The role is read from storage on every request, so
/// a demoted or deleted user loses access immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// CallerContext
///
/// Who is calling, resolved once at the router boundary by `resolve_caller` and handed to
/// handlers as an ordinary argument. An anonymous context is not an error by itself; the
/// gate decides what anonymous callers may do.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    principal: Option<Principal>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

/// Handlers pull the context the middleware stored in the request extensions. Requests that
/// bypassed the middleware are treated as anonymous.
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// resolve_caller
///
/// Router-wide middleware: resolves the session grant into a `CallerContext` and stores it
/// in the request extensions. It never rejects a request.
pub async fn resolve_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match resolve_principal(request.headers(), &state.repo, &state.config).await {
        Some(principal) => CallerContext::authenticated(principal),
        None => CallerContext::anonymous(),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// resolve_principal
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Bearer token: decode and validate the JWT (signature and expiry).
/// 3. Storage lookup: the subject must still exist; its current role is used.
pub async fn resolve_principal(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Option<Principal> {
    if config.env == Env::Local {
        let bypass_id = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());

        if let Some(user_id) = bypass_id {
            if let Some(user) = lookup_user(repo, user_id).await {
                return Some(user.into());
            }
        }
    }

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))?;

    let user_id = decode_session_token(token, &config.jwt_secret)?;

    lookup_user(repo, user_id).await.map(Principal::from)
}

/// Validates a session grant and returns its subject.
pub fn decode_session_token(token: &str, secret: &str) -> Option<Uuid> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Some(data.claims.sub),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("session grant expired"),
                _ => tracing::debug!(error = %e, "session grant rejected"),
            }
            None
        }
    }
}

async fn lookup_user(repo: &RepositoryState, user_id: Uuid) -> Option<User> {
    match repo.get_user(user_id).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "could not load session user");
            None
        }
    }
}

/// Hashes a new user's password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}
