//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - 200 once the catalog is bootstrapped
//!
//! # Auth
//! POST   /api/v1/register             - Create account, returns token
//! POST   /api/v1/auth                 - Login, returns token
//!
//! # Catalog
//! GET    /api/v1/products             - Filtered listing
//! POST   /api/v1/product              - Create product (bearer)
//! PUT    /api/v1/product              - Update product (bearer)
//! DELETE /api/v1/products/{id}        - Delete product (bearer)
//!
//! # Users (bearer)
//! GET    /api/v1/users                - All accounts, without password hashes
//! GET    /api/v1/users/me             - The caller's account
//!
//! # Catalog admin (bearer + admin role)
//! DELETE /api/v1/catalog              - Empty the catalog
//! POST   /api/v1/catalog/bootstrap    - Re-seed an empty catalog
//! ```

pub mod auth;
pub mod catalog;
pub mod products;
pub mod users;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{Next, from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::middleware::{authorize_role, request_id_middleware, require_bearer};
use crate::services::auth::ADMIN_ROLE;
use crate::state::AppState;

/// Response envelope for catalog and user endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap `data` with its status.
    pub fn reply(status: StatusCode, message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                code: status.as_u16(),
                message: message.into(),
                data,
            }),
        )
    }
}

/// Routes that need no credentials.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/auth", post(auth::authenticate))
        .route("/products", get(products::index))
}

/// Routes that need the admin role on top of a valid token.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", delete(catalog::empty))
        .route("/catalog/bootstrap", post(catalog::bootstrap))
        .route_layer(from_fn(|request: Request, next: Next| {
            authorize_role(ADMIN_ROLE, request, next)
        }))
}

/// Routes that need a valid bearer token.
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/product", post(products::create).put(products::update))
        .route("/products/{id}", delete(products::delete))
        .route("/users", get(users::index))
        .route("/users/me", get(users::me))
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state, require_bearer))
}

/// Create all API routes.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/v1",
        public_routes().merge(protected_routes(state)),
    )
}

/// Build the complete application with health checks and middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(state.clone()))
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    username = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 until the catalog has been bootstrapped.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.store().has_started().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
