//! Order create, read and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Order, OrderId, OrderStatus, UserId};
use domain::{CreateOrderInput, OrderService};
use order_store::OrderStore;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub order_service: OrderService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Handlers --

/// POST /orders: validate and persist a new order.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(input) = payload?;
    let order = state.order_service.create_order(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id}: load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order id")?);
    let order = state.order_service.get_order_by_id(order_id).await?;
    Ok(Json(order))
}

/// GET /users/{user_id}/orders: list a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_by_user<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let user_id = UserId::from_uuid(parse_uuid(&user_id, "user id")?);
    let orders = state.order_service.get_orders_by_user(user_id).await?;
    Ok(Json(orders))
}

/// PATCH /orders/{id}/status: move an order to a new status.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order id")?);
    let Json(req) = payload?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: common::ParseStatusError| ApiError::BadRequest(e.to_string()))?;

    state
        .order_service
        .update_order_status(order_id, status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}
