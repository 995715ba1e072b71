use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::engine::dispatcher::CommittedMutation;
use crate::state::AppState;

/// Hands a committed mutation to the side-effect dispatcher without waiting.
///
/// The mutation is already durable, so a full or closed queue drops the
/// audit entry and event instead of holding up the caller.
pub fn enqueue_side_effects(state: &AppState, mutation: CommittedMutation) {
    let order_id = mutation.order.id;
    let action = mutation.action;

    // Counted before the send so the dispatcher's decrement never runs first.
    state.metrics.side_effects_in_queue.inc();

    let reason = match state.side_effect_tx.try_send(mutation) {
        Ok(()) => return,
        Err(TrySendError::Full(_)) => "side-effect queue full",
        Err(TrySendError::Closed(_)) => "side-effect queue closed",
    };

    state.metrics.side_effects_in_queue.dec();
    state.metrics.side_effects_dropped_total.inc();
    warn!(
        order_id = %order_id,
        action = ?action,
        reason,
        "audit entry and event dropped"
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::enqueue_side_effects;
    use crate::config::Config;
    use crate::engine::dispatcher::CommittedMutation;
    use crate::models::audit::AuditAction;
    use crate::models::order::{DeliveryDetails, DeliveryOrder, GeoPoint};
    use crate::state::{AppState, Collaborators};

    fn mutation() -> CommittedMutation {
        let order = DeliveryOrder::new(
            Uuid::new_v4(),
            DeliveryDetails {
                customer_name: "c".to_string(),
                sender_name: "s".to_string(),
                sender_contact: "1".to_string(),
                pickup_address: "a".to_string(),
                receiver_name: "r".to_string(),
                receiver_contact: "2".to_string(),
                drop_address: "b".to_string(),
                pickup_location: GeoPoint::default(),
                delivery_location: GeoPoint::default(),
            },
        );
        CommittedMutation::new(Uuid::new_v4(), AuditAction::OrderCreated, order)
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let config = Config {
            side_effect_queue_size: 1,
            ..Config::default()
        };
        let (state, mut rx) = AppState::new(&config, Collaborators::default());

        let enqueued = tokio::time::timeout(Duration::from_secs(1), async {
            enqueue_side_effects(&state, mutation());
            enqueue_side_effects(&state, mutation());
        })
        .await;
        assert!(enqueued.is_ok());

        assert_eq!(state.metrics.side_effects_in_queue.get(), 1);
        assert_eq!(state.metrics.side_effects_dropped_total.get(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_swallowed() {
        let (state, rx) = AppState::new(&Config::default(), Collaborators::default());
        drop(rx);

        enqueue_side_effects(&state, mutation());

        assert_eq!(state.metrics.side_effects_in_queue.get(), 0);
        assert_eq!(state.metrics.side_effects_dropped_total.get(), 1);
    }
}
