pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{DeliveryOrder, OrderStatus};

pub use memory::InMemoryOrderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    Missing(Uuid),

    #[error("order {id} was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { id: Uuid, expected: u64, found: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(id) => AppError::order_not_found(id),
            StoreError::StaleVersion { .. } => AppError::Conflict(err.to_string()),
            StoreError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

/// Which orders a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    AssignedTo(Uuid),
    RequestedBy(Uuid),
}

impl OrderFilter {
    pub fn matches(&self, order: &DeliveryOrder) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::AssignedTo(courier) => order.assigned_courier == Some(*courier),
            OrderFilter::RequestedBy(requester) => order.requester == *requester,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderSlice {
    pub orders: Vec<DeliveryOrder>,
    pub total: usize,
}

/// Durable order records. Writes assign timestamps and bump `version`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: DeliveryOrder) -> Result<DeliveryOrder, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError>;

    /// Replaces the stored order if its version still equals `order.version`.
    async fn replace(&self, order: DeliveryOrder) -> Result<DeliveryOrder, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError>;

    /// Newest first; `total` counts every match regardless of `skip`/`limit`.
    async fn find(
        &self,
        filter: OrderFilter,
        skip: usize,
        limit: usize,
    ) -> Result<OrderSlice, StoreError>;

    async fn count_by_status(&self) -> Result<Vec<(OrderStatus, usize)>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}
