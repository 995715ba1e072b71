use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatcher::CommittedMutation;
use crate::engine::lifecycle::{self, TransitionPath, TransitionRequest};
use crate::engine::queue::enqueue_side_effects;
use crate::engine::scoping::{self, OrderPage, OrderView, PageRequest};
use crate::error::AppError;
use crate::models::audit::AuditAction;
use crate::models::order::{DeliveryDetails, DeliveryOrder, DetailsPatch, OrderStatus};
use crate::models::user::{Actor, Role};
use crate::state::AppState;

/// Field edits outside the transition table.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub assigned_courier: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub details: DetailsPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

pub async fn create_order(
    state: &AppState,
    actor: &Actor,
    details: DeliveryDetails,
) -> Result<DeliveryOrder, AppError> {
    details.validate().map_err(AppError::Validation)?;

    let order = state
        .orders
        .insert(DeliveryOrder::new(actor.id, details))
        .await?;

    info!(order_id = %order.id, correlation_id = %order.order_id, requester = %actor.id, "order created");

    enqueue_side_effects(
        state,
        CommittedMutation::new(actor.id, AuditAction::OrderCreated, order.clone()),
    );

    Ok(order.view_for(actor))
}

pub async fn list_orders(
    state: &AppState,
    actor: &Actor,
    request: PageRequest,
) -> Result<OrderPage, AppError> {
    scoping::list_orders(
        state.orders.as_ref(),
        state.directory.as_ref(),
        actor,
        request,
        &state.paging,
    )
    .await
}

pub async fn get_order(state: &AppState, actor: &Actor, id: Uuid) -> Result<OrderView, AppError> {
    let order = load(state, id).await?;
    if !scoping::is_visible(actor, &order) {
        return Err(AppError::order_not_found(id));
    }

    Ok(scoping::view_order(state.directory.as_ref(), actor, order).await)
}

pub async fn transition_order(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    request: TransitionRequest,
) -> Result<DeliveryOrder, AppError> {
    let outcome = apply_transition(state, actor, id, request).await;

    let label = match &outcome {
        Ok((_, path)) => path.as_str(),
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&[label])
        .inc();

    outcome.map(|(order, _)| order.view_for(actor))
}

async fn apply_transition(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    request: TransitionRequest,
) -> Result<(DeliveryOrder, TransitionPath), AppError> {
    let mut order = load(state, id).await?;
    lifecycle::authorize(actor, &order, &request)?;

    if let Some(courier) = request.courier {
        ensure_courier(state, courier).await?;
    }

    let from = order.status;
    let path = lifecycle::apply(&mut order, &request, state.otp.as_ref())?;
    let order = state.orders.replace(order).await?;

    info!(
        order_id = %order.id,
        actor_id = %actor.id,
        from = %from,
        to = %order.status,
        path = path.as_str(),
        "order status changed"
    );

    enqueue_side_effects(
        state,
        CommittedMutation::new(actor.id, AuditAction::StatusUpdated, order.clone()),
    );

    Ok((order, path))
}

pub async fn update_order(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    update: OrderUpdate,
) -> Result<DeliveryOrder, AppError> {
    let mut order = load(state, id).await?;

    match actor.role {
        Role::Admin => {
            if update.assigned_courier.is_none() && update.status.is_none() {
                return Err(AppError::Validation(
                    "admins may update assignedCourier and status".to_string(),
                ));
            }
            if let Some(courier) = update.assigned_courier {
                ensure_courier(state, courier).await?;
                order.assigned_courier = Some(courier);
            }
            if let Some(status) = update.status {
                lifecycle::apply_direct(&mut order, status)?;
            }
        }
        Role::Customer => {
            if order.requester != actor.id {
                return Err(AppError::Forbidden(
                    "order belongs to another customer".to_string(),
                ));
            }
            if update.assigned_courier.is_some() || update.status.is_some() {
                return Err(AppError::Forbidden(
                    "customers may only edit delivery details".to_string(),
                ));
            }
            if update.details.is_empty() {
                return Err(AppError::Validation("no fields to update".to_string()));
            }
            order.details.apply(update.details);
        }
        Role::Courier => {
            return Err(AppError::Forbidden(
                "couriers cannot edit orders".to_string(),
            ));
        }
    }

    let order = state.orders.replace(order).await?;

    info!(order_id = %order.id, actor_id = %actor.id, role = %actor.role, "order updated");

    enqueue_side_effects(
        state,
        CommittedMutation::new(actor.id, AuditAction::OrderUpdated, order.clone()),
    );

    Ok(order.view_for(actor))
}

/// Only the requester may delete; everyone else is told the order does not exist.
pub async fn delete_order(state: &AppState, actor: &Actor, id: Uuid) -> Result<(), AppError> {
    let order = load(state, id).await?;
    if order.requester != actor.id {
        return Err(AppError::order_not_found(id));
    }

    let removed = state
        .orders
        .delete(id)
        .await?
        .ok_or_else(|| AppError::order_not_found(id))?;

    info!(order_id = %id, actor_id = %actor.id, "order deleted");

    enqueue_side_effects(
        state,
        CommittedMutation::new(actor.id, AuditAction::OrderDeleted, removed),
    );

    Ok(())
}

pub async fn order_stats(state: &AppState) -> Result<Vec<StatusCount>, AppError> {
    let counts = state.orders.count_by_status().await?;
    Ok(counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect())
}

async fn load(state: &AppState, id: Uuid) -> Result<DeliveryOrder, AppError> {
    state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::order_not_found(id))
}

async fn ensure_courier(state: &AppState, courier: Uuid) -> Result<(), AppError> {
    match state.directory.profile(courier).await {
        Some(profile) if profile.role == Role::Courier => Ok(()),
        Some(_) => Err(AppError::Validation(format!("user {courier} is not a courier"))),
        None => Err(AppError::Validation(format!("courier {courier} not found"))),
    }
}
