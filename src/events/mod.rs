use tokio::sync::broadcast;
use tracing::debug;

use crate::models::order::DeliveryOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    OrderCreated,
    OrderStatusChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order.created",
            EventKind::OrderStatusChanged => "order.status_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub enum OrderEvent {
    Created(DeliveryOrder),
    StatusChanged(DeliveryOrder),
}

impl OrderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            OrderEvent::Created(_) => EventKind::OrderCreated,
            OrderEvent::StatusChanged(_) => EventKind::OrderStatusChanged,
        }
    }

    pub fn order(&self) -> &DeliveryOrder {
        match self {
            OrderEvent::Created(order) | OrderEvent::StatusChanged(order) => order,
        }
    }
}

/// In-process publish/subscribe for order mutations.
///
/// Publication never blocks and never buffers for absent subscribers: an
/// event published while nobody listens is dropped. Each live subscriber
/// sees every event once, in publication order, as long as it keeps up with
/// the channel capacity.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: OrderEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(kind = kind.as_str(), "no subscribers; event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{EventBus, EventKind, OrderEvent};
    use crate::models::order::{DeliveryDetails, DeliveryOrder, GeoPoint};

    fn order() -> DeliveryOrder {
        DeliveryOrder::new(
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
        )
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(OrderEvent::Created(order())), 0);

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_order() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let created = order();
        let mut changed = created.clone();
        changed.version = 2;

        assert_eq!(bus.publish(OrderEvent::Created(created.clone())), 2);
        assert_eq!(bus.publish(OrderEvent::StatusChanged(changed.clone())), 2);

        for rx in [&mut first, &mut second] {
            let a = rx.recv().await.unwrap();
            let b = rx.recv().await.unwrap();
            assert_eq!(a.kind(), EventKind::OrderCreated);
            assert_eq!(b.kind(), EventKind::OrderStatusChanged);
            assert_eq!(b.order().version, 2);
            assert!(rx.try_recv().is_err());
        }
    }
}
