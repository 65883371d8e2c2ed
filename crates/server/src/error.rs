//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every error becomes a JSON body `{ "code": <status>, "message": <text> }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::auth::{AuthError, TokenError};
use crate::store::StoreError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Catalog store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The seed catalog could not be fetched.
    #[error("Seed source unavailable")]
    SourceUnavailable,

    /// No usable credentials on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Bearer token failed verification.
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Authenticated, but lacking the required role.
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => match err {
                StoreError::Conflict(_) | StoreError::DuplicateUser(_) => StatusCode::CONFLICT,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                StoreError::Unavailable(_)
                | StoreError::Persist(_)
                | StoreError::PasswordHash
                | StoreError::IdsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidUsername(_)
                | AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Store(inner) => match inner {
                    StoreError::DuplicateUser(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
                AuthError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SourceUnavailable => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn message(&self) -> String {
        match self {
            Self::Store(err) => match err {
                StoreError::Conflict(id) => format!("Product {id} already exists"),
                StoreError::DuplicateUser(_) => "User already exists".to_string(),
                StoreError::NotFound(id) => format!("Product {id} not found"),
                StoreError::InvalidArgument(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => "User already exists".to_string(),
                AuthError::InvalidUsername(e) => format!("Invalid username: {e}"),
                AuthError::MissingField(field) => format!("{field} is required"),
                AuthError::Store(StoreError::DuplicateUser(_)) => "User already exists".to_string(),
                AuthError::Store(_) | AuthError::Token(_) => "Internal server error".to_string(),
            },
            Self::SourceUnavailable => "Seed catalog unavailable".to_string(),
            Self::Unauthorized(msg) => (*msg).to_string(),
            Self::InvalidToken(_) => "Invalid token".to_string(),
            Self::Forbidden => "Forbidden".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "code": status.as_u16(),
            "message": self.message(),
        });
        // Verification detail only; the presented token is never echoed.
        if let Self::InvalidToken(err) = &self {
            body["error"] = json!(err.to_string());
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}
