use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::{EventKind, OrderEvent};
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::order::DeliveryOrder;
use crate::state::AppState;

/// Everything that has to happen after an order write lands.
#[derive(Debug, Clone)]
pub struct CommittedMutation {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub order: DeliveryOrder,
    pub event: Option<EventKind>,
}

impl CommittedMutation {
    pub fn new(actor_id: Uuid, action: AuditAction, order: DeliveryOrder) -> Self {
        let event = match action {
            AuditAction::OrderCreated => Some(EventKind::OrderCreated),
            AuditAction::StatusUpdated | AuditAction::OrderUpdated => {
                Some(EventKind::OrderStatusChanged)
            }
            AuditAction::OrderDeleted => None,
        };

        Self {
            actor_id,
            action,
            order,
            event,
        }
    }
}

/// Drains committed mutations: audit first, then publish.
///
/// A single consumer keeps side effects in commit order. Failures here never
/// reach the request that produced the mutation.
pub async fn run_side_effect_dispatcher(
    state: Arc<AppState>,
    mut rx: mpsc::Receiver<CommittedMutation>,
) {
    info!("side-effect dispatcher started");

    while let Some(mutation) = rx.recv().await {
        state.metrics.side_effects_in_queue.dec();
        dispatch(&state, mutation).await;
    }

    warn!("side-effect dispatcher stopped: queue channel closed");
}

async fn dispatch(state: &AppState, mutation: CommittedMutation) {
    let CommittedMutation {
        actor_id,
        action,
        order,
        event,
    } = mutation;
    let order_id = order.id;

    let entry = AuditEntry::new(actor_id, action, order.clone());
    if let Err(err) = state.audit.record(entry).await {
        state.metrics.audit_failures_total.inc();
        error!(order_id = %order_id, action = ?action, error = %err, "audit write failed");
    }

    let Some(kind) = event else {
        return;
    };

    let event = match kind {
        EventKind::OrderCreated => OrderEvent::Created(order),
        EventKind::OrderStatusChanged => OrderEvent::StatusChanged(order),
    };
    let reached = state.bus.publish(event);
    state
        .metrics
        .events_published_total
        .with_label_values(&[kind.as_str()])
        .inc();

    debug!(order_id = %order_id, kind = kind.as_str(), subscribers = reached, "event published");
}
