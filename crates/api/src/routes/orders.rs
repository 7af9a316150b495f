//! Order endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use common::OrderId;
use domain::Order;
use orchestrator::OrderOrchestrator;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrderOrchestrator,
}

fn order_id(path: Result<Path<i64>, PathRejection>) -> Result<OrderId, ApiError> {
    let Path(id) = path?;
    Ok(OrderId::new(id))
}

/// POST /orders: create and price a new order.
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Order>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body?;
    let order = state.orchestrator.create(request).await?;
    Ok(Json(order))
}

/// PUT /orders: rewrite an existing order identified by `id` in the body.
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    body: Result<Json<Order>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body?;
    if request.id.as_i64() <= 0 {
        return Err(ApiError::BadRequest("id is required".to_string()));
    }
    let order = state.orchestrator.update(request).await?;
    Ok(Json(order))
}

/// DELETE /orders/{id}: cancel an order. The order is kept.
#[tracing::instrument(skip(state, path))]
pub async fn cancel(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Order>, ApiError> {
    let id = order_id(path)?;
    let order = state.orchestrator.cancel(id).await?;
    Ok(Json(order))
}

/// GET /orders/{id}: read an order with its line items.
#[tracing::instrument(skip(state, path))]
pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Order>, ApiError> {
    let id = order_id(path)?;
    let order = state.orchestrator.get(id).await?;
    Ok(Json(order))
}
