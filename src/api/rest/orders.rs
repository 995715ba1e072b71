use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::lifecycle::TransitionRequest;
use crate::engine::orders::{self, OrderUpdate, StatusCount};
use crate::engine::scoping::{OrderPage, OrderView, PageRequest};
use crate::error::AppError;
use crate::models::order::{DeliveryDetails, DeliveryOrder, DetailsPatch, OrderStatus};
use crate::models::user::Actor;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/stats", get(order_stats))
        .route("/orders/:id", get(get_order).delete(delete_order))
        .route("/orders/status/:id", put(update_status))
        .route("/orders/update/:id", put(update_order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub otp: Option<String>,
    #[serde(alias = "assignedDriver", alias = "assignedCourier")]
    pub courier_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[serde(alias = "assignedDriver")]
    pub assigned_courier: Option<Uuid>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: DetailsPatch,
}

fn parse_status(raw: Option<String>) -> Result<Option<OrderStatus>, AppError> {
    raw.map(|raw| raw.parse::<OrderStatus>().map_err(AppError::Validation))
        .transpose()
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<DeliveryDetails>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = orders::create_order(&state, &actor, payload).await?;
    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(page): Query<PageRequest>,
) -> Result<Json<OrderPage>, AppError> {
    let page = orders::list_orders(&state, &actor, page).await?;
    Ok(Json(page))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = orders::get_order(&state, &actor, id).await?;
    Ok(Json(view))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let request = TransitionRequest {
        status: parse_status(payload.status)?,
        otp: payload.otp,
        courier: payload.courier_id,
    };

    let order = orders::transition_order(&state, &actor, id, request).await?;
    Ok(Json(order))
}

async fn update_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let update = OrderUpdate {
        assigned_courier: payload.assigned_courier,
        status: parse_status(payload.status)?,
        details: payload.details,
    };

    let order = orders::update_order(&state, &actor, id, update).await?;
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    orders::delete_order(&state, &actor, id).await?;
    Ok(Json(json!({ "message": "Order deleted" })))
}

async fn order_stats(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Result<Json<Vec<StatusCount>>, AppError> {
    let stats = orders::order_stats(&state).await?;
    Ok(Json(stats))
}
