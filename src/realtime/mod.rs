use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use prometheus::IntGauge;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::scoping;
use crate::events::OrderEvent;
use crate::models::order::{DeliveryOrder, GeoPoint};
use crate::models::user::Actor;

/// Who receives order events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Every session gets every order event, unredacted.
    Global,
    /// Sessions only get orders their actor could list, with the OTP redacted for non-owners.
    Scoped,
}

impl FromStr for BroadcastScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(BroadcastScope::Global),
            "scoped" => Ok(BroadcastScope::Scoped),
            other => Err(format!("unknown realtime scope: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundMessage {
    OrderCreated(DeliveryOrder),
    StatusUpdated(DeliveryOrder),
    LocationUpdate(GeoPoint),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundMessage {
    DriverLocation(GeoPoint),
}

struct Session {
    actor: Option<Actor>,
    tx: mpsc::Sender<OutboundMessage>,
}

pub struct SessionHandle {
    pub id: Uuid,
    pub rx: mpsc::Receiver<OutboundMessage>,
}

/// Registry of connected observer sessions and the fan-out over them.
#[derive(Clone)]
pub struct Gateway {
    sessions: Arc<DashMap<Uuid, Session>>,
    scope: BroadcastScope,
    session_buffer: usize,
    sessions_gauge: IntGauge,
}

impl Gateway {
    pub fn new(scope: BroadcastScope, session_buffer: usize, sessions_gauge: IntGauge) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            scope,
            session_buffer: session_buffer.max(1),
            sessions_gauge,
        }
    }

    pub fn scope(&self) -> BroadcastScope {
        self.scope
    }

    pub fn connect(&self, actor: Option<Actor>) -> SessionHandle {
        let (tx, rx) = mpsc::channel(self.session_buffer);
        let id = Uuid::new_v4();
        self.sessions.insert(id, Session { actor, tx });
        self.sessions_gauge.set(self.sessions.len() as i64);

        info!(session_id = %id, actor_id = ?actor.map(|a| a.id), "realtime session connected");
        SessionHandle { id, rx }
    }

    pub fn disconnect(&self, id: Uuid) {
        if self.sessions.remove(&id).is_some() {
            self.sessions_gauge.set(self.sessions.len() as i64);
            info!(session_id = %id, "realtime session disconnected");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Fans an order event out to the sessions connected right now.
    pub fn broadcast_event(&self, event: &OrderEvent) -> usize {
        let scope = self.scope;
        self.fan_out(|session| {
            let order = match scope {
                BroadcastScope::Global => event.order().clone(),
                BroadcastScope::Scoped => {
                    let actor = session.actor.as_ref()?;
                    if !scoping::is_visible(actor, event.order()) {
                        return None;
                    }
                    event.order().view_for(actor)
                }
            };

            Some(match event {
                OrderEvent::Created(_) => OutboundMessage::OrderCreated(order),
                OrderEvent::StatusChanged(_) => OutboundMessage::StatusUpdated(order),
            })
        })
    }

    /// Rebroadcasts a position ping to every session, sender included.
    pub fn relay_location(&self, from: Uuid, ping: GeoPoint) -> usize {
        if !ping.lat.is_finite() || !ping.lng.is_finite() {
            warn!(session_id = %from, "dropping non-finite location ping");
            return 0;
        }
        self.fan_out(|_| Some(OutboundMessage::LocationUpdate(ping)))
    }

    fn fan_out<F>(&self, mut message_for: F) -> usize
    where
        F: FnMut(&Session) -> Option<OutboundMessage>,
    {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            let Some(message) = message_for(entry.value()) else {
                continue;
            };

            match entry.value().tx.try_send(message) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session_id = %entry.key(), "session queue full; message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// Forwards bus events to the gateway until the bus goes away.
pub async fn run_realtime_relay(gateway: Gateway, mut events: broadcast::Receiver<OrderEvent>) {
    info!(scope = ?gateway.scope(), "realtime relay started");

    loop {
        match events.recv().await {
            Ok(event) => {
                gateway.broadcast_event(&event);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "realtime relay lagged behind the event bus");
            }
            Err(RecvError::Closed) => break,
        }
    }

    warn!("realtime relay stopped: event bus closed");
}

#[cfg(test)]
mod tests {
    use prometheus::IntGauge;
    use uuid::Uuid;

    use super::{BroadcastScope, Gateway, InboundMessage, OutboundMessage};
    use crate::events::OrderEvent;
    use crate::models::order::{DeliveryDetails, DeliveryOrder, GeoPoint};
    use crate::models::user::{Actor, Role};

    fn gateway(scope: BroadcastScope) -> Gateway {
        Gateway::new(scope, 16, IntGauge::new("sessions", "test").unwrap())
    }

    fn order(requester: Uuid) -> DeliveryOrder {
        DeliveryOrder::new(
            requester,
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
    fn broadcast_reaches_only_sessions_connected_at_publish_time() {
        let gateway = gateway(BroadcastScope::Global);
        let mut early_a = gateway.connect(None);
        let mut early_b = gateway.connect(None);

        let event = OrderEvent::StatusChanged(order(Uuid::new_v4()));
        assert_eq!(gateway.broadcast_event(&event), 2);

        let mut late = gateway.connect(None);

        for handle in [&mut early_a, &mut early_b] {
            assert!(matches!(
                handle.rx.try_recv(),
                Ok(OutboundMessage::StatusUpdated(_))
            ));
            assert!(handle.rx.try_recv().is_err());
        }
        assert!(late.rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_sessions_are_forgotten() {
        let gateway = gateway(BroadcastScope::Global);
        let handle = gateway.connect(None);
        assert_eq!(gateway.session_count(), 1);

        gateway.disconnect(handle.id);
        assert_eq!(gateway.session_count(), 0);
        assert_eq!(gateway.relay_location(Uuid::new_v4(), GeoPoint::default()), 0);
    }

    #[test]
    fn location_pings_go_to_everyone() {
        let gateway = gateway(BroadcastScope::Scoped);
        let mut courier = gateway.connect(Some(Actor::new(Uuid::new_v4(), Role::Courier)));
        let mut anonymous = gateway.connect(None);

        let ping = GeoPoint {
            lat: 12.97,
            lng: 77.59,
        };
        assert_eq!(gateway.relay_location(courier.id, ping), 2);
        assert_eq!(
            anonymous.rx.try_recv().unwrap(),
            OutboundMessage::LocationUpdate(ping)
        );
        assert_eq!(
            courier.rx.try_recv().unwrap(),
            OutboundMessage::LocationUpdate(ping)
        );
    }

    #[test]
    fn scoped_mode_filters_and_redacts() {
        let gateway = gateway(BroadcastScope::Scoped);
        let owner = Actor::new(Uuid::new_v4(), Role::Customer);
        let courier = Actor::new(Uuid::new_v4(), Role::Courier);
        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);

        let mut owner_session = gateway.connect(Some(owner));
        let mut courier_session = gateway.connect(Some(courier));
        let mut stranger_session = gateway.connect(Some(stranger));
        let mut anonymous = gateway.connect(None);

        let mut order = order(owner.id);
        order.assigned_courier = Some(courier.id);
        order.delivery_otp = Some("4821".to_string());

        assert_eq!(gateway.broadcast_event(&OrderEvent::StatusChanged(order)), 2);

        match owner_session.rx.try_recv().unwrap() {
            OutboundMessage::StatusUpdated(seen) => {
                assert_eq!(seen.delivery_otp.as_deref(), Some("4821"))
            }
            other => panic!("unexpected message {other:?}"),
        }
        match courier_session.rx.try_recv().unwrap() {
            OutboundMessage::StatusUpdated(seen) => assert!(seen.delivery_otp.is_none()),
            other => panic!("unexpected message {other:?}"),
        }
        assert!(stranger_session.rx.try_recv().is_err());
        assert!(anonymous.rx.try_recv().is_err());
    }

    #[test]
    fn wire_format_uses_event_names() {
        let json = serde_json::to_value(OutboundMessage::LocationUpdate(GeoPoint {
            lat: 1.0,
            lng: 2.0,
        }))
        .unwrap();
        assert_eq!(json["event"], "locationUpdate");
        assert_eq!(json["data"]["lat"], 1.0);

        let inbound: InboundMessage =
            serde_json::from_str(r#"{"event":"driverLocation","data":{"lat":3.5,"lng":4.5}}"#)
                .unwrap();
        assert_eq!(
            inbound,
            InboundMessage::DriverLocation(GeoPoint { lat: 3.5, lng: 4.5 })
        );
    }
}
