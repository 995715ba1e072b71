use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::DeliveryOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OrderCreated,
    StatusUpdated,
    OrderUpdated,
    OrderDeleted,
}

/// Append-only record of one committed mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub snapshot: DeliveryOrder,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor_id: Uuid, action: AuditAction, snapshot: DeliveryOrder) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            action,
            snapshot,
            recorded_at: Utc::now(),
        }
    }
}
