//! Catalog administration handlers (admin role).

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::{info, instrument};

use super::Envelope;
use crate::error::{AppError, Result};
use crate::middleware::AuthClaims;
use crate::state::AppState;
use crate::store::BootstrapOutcome;

#[derive(Debug, Serialize)]
pub struct BootstrapReport {
    pub seeded: usize,
}

/// DELETE /api/v1/catalog
///
/// Clears products and the bootstrap flag; the next listing re-seeds.
#[instrument(skip_all, fields(by = %claims.username))]
pub async fn empty(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<impl IntoResponse> {
    state.store().empty_catalog().await?;
    info!("Catalog emptied by admin");

    Ok(Envelope::reply(StatusCode::OK, "Catalog emptied", ()))
}

/// POST /api/v1/catalog/bootstrap
#[instrument(skip_all)]
pub async fn bootstrap(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let seeded = match state.store().bootstrap_if_needed().await? {
        BootstrapOutcome::AlreadyStarted => 0,
        BootstrapOutcome::Seeded(count) => count,
        BootstrapOutcome::Deferred => return Err(AppError::SourceUnavailable),
    };

    Ok(Envelope::reply(
        StatusCode::OK,
        "Catalog bootstrapped",
        BootstrapReport { seeded },
    ))
}
