use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Actor, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Assigned,
    Picked,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Created,
        OrderStatus::Assigned,
        OrderStatus::Picked,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Picked => "picked",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// `assigned` and everything after it on the happy path need a courier on the order.
    pub fn requires_courier(&self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned
                | OrderStatus::Picked
                | OrderStatus::InTransit
                | OrderStatus::Delivered
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown status: {raw}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
    pub customer_name: String,
    pub sender_name: String,
    pub sender_contact: String,
    pub pickup_address: String,
    pub receiver_name: String,
    pub receiver_contact: String,
    pub drop_address: String,
    #[serde(default)]
    pub pickup_location: GeoPoint,
    #[serde(default)]
    pub delivery_location: GeoPoint,
}

impl DeliveryDetails {
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("customerName", &self.customer_name),
            ("senderName", &self.sender_name),
            ("senderContact", &self.sender_contact),
            ("pickupAddress", &self.pickup_address),
            ("receiverName", &self.receiver_name),
            ("receiverContact", &self.receiver_contact),
            ("dropAddress", &self.drop_address),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(format!("{field} cannot be empty")),
            None => Ok(()),
        }
    }

    /// Applies every field present in `patch`, keeping the rest.
    pub fn apply(&mut self, patch: DetailsPatch) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        }

        set(&mut self.customer_name, patch.customer_name);
        set(&mut self.sender_name, patch.sender_name);
        set(&mut self.sender_contact, patch.sender_contact);
        set(&mut self.pickup_address, patch.pickup_address);
        set(&mut self.receiver_name, patch.receiver_name);
        set(&mut self.receiver_contact, patch.receiver_contact);
        set(&mut self.drop_address, patch.drop_address);

        if let Some(location) = patch.pickup_location {
            self.pickup_location = location;
        }
        if let Some(location) = patch.delivery_location {
            self.delivery_location = location;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsPatch {
    pub customer_name: Option<String>,
    pub sender_name: Option<String>,
    pub sender_contact: Option<String>,
    pub pickup_address: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_contact: Option<String>,
    pub drop_address: Option<String>,
    pub pickup_location: Option<GeoPoint>,
    pub delivery_location: Option<GeoPoint>,
}

impl DetailsPatch {
    pub fn is_empty(&self) -> bool {
        self == &DetailsPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOrder {
    /// Storage key.
    pub id: Uuid,
    /// Shareable correlation id, distinct from the storage key.
    pub order_id: String,
    pub requester: Uuid,
    pub assigned_courier: Option<Uuid>,
    #[serde(flatten)]
    pub details: DeliveryDetails,
    pub status: OrderStatus,
    pub delivery_otp: Option<String>,
    pub otp_verified: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    /// A fresh order in `created`. Timestamps are placeholders until the store stamps it.
    pub fn new(requester: Uuid, details: DeliveryDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4().to_string(),
            requester,
            assigned_courier: None,
            details,
            status: OrderStatus::Created,
            delivery_otp: None,
            otp_verified: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The OTP is only handed to the requester and admins; couriers get it from the customer.
    pub fn view_for(&self, actor: &Actor) -> DeliveryOrder {
        let mut view = self.clone();
        let sees_otp = match actor.role {
            Role::Admin => true,
            Role::Customer => self.requester == actor.id,
            Role::Courier => false,
        };
        if !sees_otp {
            view.delivery_otp = None;
        }
        view
    }
}
