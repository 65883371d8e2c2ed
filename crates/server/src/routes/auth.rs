//! Registration and login handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Registration request body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

/// Token issued on successful registration or login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub code: u16,
    pub token: String,
    pub message: &'static str,
}

/// POST /api/v1/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(form) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let token = state
        .auth()
        .register(&form.name, &form.username, &form.password)
        .await?;

    Ok(Json(TokenResponse {
        code: StatusCode::OK.as_u16(),
        token,
        message: "Successfully registered",
    }))
}

/// POST /api/v1/auth
#[instrument(skip_all)]
pub async fn authenticate(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    let Json(form) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let token = state
        .auth()
        .authenticate(&form.username, &form.password)
        .await?;

    Ok(Json(TokenResponse {
        code: StatusCode::OK.as_u16(),
        token,
        message: "Authenticated",
    }))
}
