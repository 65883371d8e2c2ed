//! User account handlers. Password hashes never leave the store.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use stockroom_core::{PublicUser, Username};

use super::Envelope;
use crate::error::{AppError, Result};
use crate::middleware::AuthClaims;
use crate::state::AppState;

/// GET /api/v1/users
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let users: Vec<PublicUser> = state
        .store()
        .list_users()
        .await
        .iter()
        .map(PublicUser::from)
        .collect();

    Envelope::reply(StatusCode::OK, "Users", users)
}

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<impl IntoResponse> {
    let not_found = || AppError::NotFound(format!("User {}", claims.username));

    let username = Username::parse(&claims.username).map_err(|_| not_found())?;
    let user = state
        .store()
        .find_user_by_username(&username)
        .await
        .ok_or_else(not_found)?;

    Ok(Envelope::reply(StatusCode::OK, "User", PublicUser::from(&user)))
}
