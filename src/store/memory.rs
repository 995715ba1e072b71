use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::store::{OrderFilter, OrderSlice, OrderStore, StoreError};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, DeliveryOrder>,
    last_stamp_micros: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall clock, nudged forward so no two writes share an instant.
    fn stamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last_stamp_micros.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_stamp_micros.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
                Err(current) => last = current,
            }
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, mut order: DeliveryOrder) -> Result<DeliveryOrder, StoreError> {
        let now = self.stamp();
        order.created_at = now;
        order.updated_at = now;
        order.version = 1;

        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn replace(&self, mut order: DeliveryOrder) -> Result<DeliveryOrder, StoreError> {
        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::Missing(order.id))?;

        if stored.version != order.version {
            return Err(StoreError::StaleVersion {
                id: order.id,
                expected: order.version,
                found: stored.version,
            });
        }

        order.created_at = stored.created_at;
        order.updated_at = self.stamp();
        order.version += 1;
        *stored = order.clone();

        Ok(order)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError> {
        Ok(self.orders.remove(&id).map(|(_, order)| order))
    }

    async fn find(
        &self,
        filter: OrderFilter,
        skip: usize,
        limit: usize,
    ) -> Result<OrderSlice, StoreError> {
        let mut matching: Vec<DeliveryOrder> = self
            .orders
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len();
        let orders = matching.into_iter().skip(skip).take(limit).collect();

        Ok(OrderSlice { orders, total })
    }

    async fn count_by_status(&self) -> Result<Vec<(OrderStatus, usize)>, StoreError> {
        let counts = OrderStatus::ALL
            .into_iter()
            .map(|status| {
                let count = self
                    .orders
                    .iter()
                    .filter(|entry| entry.value().status == status)
                    .count();
                (status, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();

        Ok(counts)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.orders.len())
    }
}
