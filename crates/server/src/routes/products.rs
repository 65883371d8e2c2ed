//! Product catalog handlers.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use stockroom_core::{Product, ProductDraft, ProductFilter, ProductId};
use tracing::instrument;

use super::Envelope;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// GET /api/v1/products?minPrice&maxPrice&minStock&maxStock
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    query: std::result::Result<Query<ProductFilter>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(filter) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let products: Vec<Product> = state.store().list_products(&filter).await?;

    Ok(Envelope::reply(StatusCode::OK, "Products", products))
}

/// POST /api/v1/product
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    body: std::result::Result<Json<ProductDraft>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(draft) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let product = state.store().create_product(draft).await?;

    Ok(Envelope::reply(StatusCode::CREATED, "Product created", product))
}

/// PUT /api/v1/product
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    body: std::result::Result<Json<ProductDraft>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(draft) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let product = state.store().update_product(draft).await?;

    Ok(Envelope::reply(StatusCode::OK, "Product updated", product))
}

/// DELETE /api/v1/products/{id}
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = ProductId::from(id);
    if !state.store().delete_product(&id).await? {
        return Err(AppError::NotFound(format!("Product {id}")));
    }

    Ok(Envelope::reply(
        StatusCode::OK,
        format!("Product {id} deleted"),
        (),
    ))
}
