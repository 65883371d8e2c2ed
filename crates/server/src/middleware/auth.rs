//! Bearer token gateway.
//!
//! [`require_bearer`] runs on every protected route:
//!
//! ```text
//! no Authorization header          → 401 "No authorization header"
//! not exactly "Bearer <token>"     → 401 "Malformed authorization header"
//! token fails signature/expiry     → 401 "Invalid token" (+ failure detail)
//! otherwise                        → claims attached, request proceeds
//! ```
//!
//! [`authorize_role`] layers on top and answers 403 unless the attached
//! claims carry the required role.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{Span, debug};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{Claims, TokenSigner};
use crate::state::AppState;

/// Verify the bearer token and attach its claims to the request.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` or `AppError::InvalidToken`.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(state.tokens(), request.headers().get(AUTHORIZATION))?;

    Span::current().record("username", claims.username.as_str());
    set_sentry_user(&claims.username);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Let the request through only if its claims carry `role`.
///
/// Must run after [`require_bearer`].
///
/// # Errors
///
/// Returns `AppError::Forbidden`.
pub async fn authorize_role(
    role: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = request
        .extensions()
        .get::<Claims>()
        .is_some_and(|claims| claims.has_role(role));

    if !allowed {
        debug!(role, "Role check failed");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

fn authenticate(tokens: &TokenSigner, header: Option<&HeaderValue>) -> Result<Claims, AppError> {
    let header = header.ok_or(AppError::Unauthorized("No authorization header"))?;
    let token = bearer_token(header).ok_or(AppError::Unauthorized("Malformed authorization header"))?;

    tokens.verify(token).map_err(|e| {
        debug!(error = %e, "Token rejected");
        AppError::InvalidToken(e)
    })
}

/// Split `Bearer <token>` into its token.
fn bearer_token(header: &HeaderValue) -> Option<&str> {
    let value = header.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Extractor for the claims attached by [`require_bearer`].
///
/// # Example
///
/// ```rust,ignore
/// async fn whoami(AuthClaims(claims): AuthClaims) -> String {
///     claims.username
/// }
/// ```
pub struct AuthClaims(pub Claims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Self)
            .ok_or(AppError::Unauthorized("No authorization header"))
    }
}
