use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::IdentityDirectory;
use crate::error::AppError;
use crate::models::order::DeliveryOrder;
use crate::models::user::{Actor, Role, UserProfile};
use crate::store::{OrderFilter, OrderStore};

/// The orders an actor is entitled to see.
pub fn scope_for(actor: &Actor) -> OrderFilter {
    match actor.role {
        Role::Admin => OrderFilter::All,
        Role::Courier => OrderFilter::AssignedTo(actor.id),
        Role::Customer => OrderFilter::RequestedBy(actor.id),
    }
}

pub fn is_visible(actor: &Actor, order: &DeliveryOrder) -> bool {
    scope_for(actor).matches(order)
}

#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 5,
            max_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageRequest {
    /// Resolves to `(skip, limit)`.
    fn bounds(&self, limits: &PageLimits) -> Result<(usize, usize), AppError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("page must be >= 1".to_string()));
        }

        let limit = self.limit.unwrap_or(limits.default_size);
        if limit == 0 {
            return Err(AppError::Validation("limit must be >= 1".to_string()));
        }
        let limit = limit.min(limits.max_size);

        let skip = (page - 1).saturating_mul(limit);
        Ok((skip, limit))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: DeliveryOrder,
    pub requester_profile: Option<UserProfile>,
    pub courier_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total: usize,
}

pub async fn list_orders(
    store: &dyn OrderStore,
    directory: &dyn IdentityDirectory,
    actor: &Actor,
    request: PageRequest,
    limits: &PageLimits,
) -> Result<OrderPage, AppError> {
    let (skip, limit) = request.bounds(limits)?;
    let slice = store.find(scope_for(actor), skip, limit).await?;

    let mut profiles = ProfileCache::new(directory);
    let mut orders = Vec::with_capacity(slice.orders.len());
    for order in slice.orders {
        orders.push(enrich(&mut profiles, actor, order).await);
    }

    Ok(OrderPage {
        orders,
        total: slice.total,
    })
}

pub async fn view_order(
    directory: &dyn IdentityDirectory,
    actor: &Actor,
    order: DeliveryOrder,
) -> OrderView {
    let mut profiles = ProfileCache::new(directory);
    enrich(&mut profiles, actor, order).await
}

async fn enrich(
    profiles: &mut ProfileCache<'_>,
    actor: &Actor,
    order: DeliveryOrder,
) -> OrderView {
    let requester_profile = profiles.resolve(order.requester).await;
    let courier_profile = match order.assigned_courier {
        Some(courier) => profiles.resolve(courier).await,
        None => None,
    };

    OrderView {
        order: order.view_for(actor),
        requester_profile,
        courier_profile,
    }
}

struct ProfileCache<'a> {
    directory: &'a dyn IdentityDirectory,
    seen: HashMap<Uuid, Option<UserProfile>>,
}

impl<'a> ProfileCache<'a> {
    fn new(directory: &'a dyn IdentityDirectory) -> Self {
        Self {
            directory,
            seen: HashMap::new(),
        }
    }

    async fn resolve(&mut self, id: Uuid) -> Option<UserProfile> {
        if let Some(profile) = self.seen.get(&id) {
            return profile.clone();
        }
        let profile = self.directory.profile(id).await;
        self.seen.insert(id, profile.clone());
        profile
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::{list_orders, PageLimits, PageRequest};
    use crate::directory::InMemoryDirectory;
    use crate::error::AppError;
    use crate::models::order::{DeliveryDetails, DeliveryOrder, GeoPoint};
    use crate::models::user::{Actor, Role, UserProfile};
    use crate::store::{InMemoryOrderStore, OrderStore};

    fn details() -> DeliveryDetails {
        DeliveryDetails {
            customer_name: "Ada".to_string(),
            sender_name: "Ada".to_string(),
            sender_contact: "555-0100".to_string(),
            pickup_address: "1 Depot Rd".to_string(),
            receiver_name: "Grace".to_string(),
            receiver_contact: "555-0199".to_string(),
            drop_address: "9 Harbour St".to_string(),
            pickup_location: GeoPoint::default(),
            delivery_location: GeoPoint::default(),
        }
    }

    struct Fixture {
        store: InMemoryOrderStore,
        directory: InMemoryDirectory,
        alice: Actor,
        bob: Actor,
        courier: Actor,
        admin: Actor,
    }

    /// Alice owns 7 orders (3 assigned to the courier), Bob owns 2.
    async fn fixture() -> Fixture {
        let store = InMemoryOrderStore::new();
        let directory = InMemoryDirectory::new();
        let alice = Actor::new(Uuid::new_v4(), Role::Customer);
        let bob = Actor::new(Uuid::new_v4(), Role::Customer);
        let courier = Actor::new(Uuid::new_v4(), Role::Courier);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        directory.insert(UserProfile {
            id: courier.id,
            name: "Dan".to_string(),
            email: "dan@example.com".to_string(),
            role: Role::Courier,
        });

        for i in 0..7 {
            let mut order = DeliveryOrder::new(alice.id, details());
            if i % 2 == 0 && i < 6 {
                order.assigned_courier = Some(courier.id);
            }
            store.insert(order).await.unwrap();
        }
        for _ in 0..2 {
            store.insert(DeliveryOrder::new(bob.id, details())).await.unwrap();
        }

        Fixture {
            store,
            directory,
            alice,
            bob,
            courier,
            admin,
        }
    }

    #[tokio::test]
    async fn each_role_sees_only_its_scope() {
        let f = fixture().await;
        let limits = PageLimits::default();
        let all = PageRequest {
            page: Some(1),
            limit: Some(100),
        };

        let admin = list_orders(&f.store, &f.directory, &f.admin, all, &limits).await.unwrap();
        assert_eq!(admin.total, 9);

        let courier = list_orders(&f.store, &f.directory, &f.courier, all, &limits)
            .await
            .unwrap();
        assert_eq!(courier.total, 3);
        assert!(courier
            .orders
            .iter()
            .all(|view| view.order.assigned_courier == Some(f.courier.id)));
        assert!(courier.orders.iter().all(|view| view.courier_profile.is_some()));

        let bob = list_orders(&f.store, &f.directory, &f.bob, all, &limits).await.unwrap();
        assert_eq!(bob.total, 2);
        assert!(bob.orders.iter().all(|view| view.order.requester == f.bob.id));
    }

    #[tokio::test]
    async fn pages_partition_the_scoped_set() {
        let f = fixture().await;
        let limits = PageLimits::default();

        let first = list_orders(&f.store, &f.directory, &f.alice, PageRequest::default(), &limits)
            .await
            .unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.orders.len(), 5);

        let mut seen = HashSet::new();
        let mut previous = None;
        for page in 1..=3 {
            let request = PageRequest {
                page: Some(page),
                limit: Some(3),
            };
            let result = list_orders(&f.store, &f.directory, &f.alice, request, &limits)
                .await
                .unwrap();
            assert_eq!(result.total, 7);
            assert!(result.orders.len() <= 3);
            for view in result.orders {
                if let Some(prev) = previous {
                    assert!(view.order.created_at < prev);
                }
                previous = Some(view.order.created_at);
                assert!(seen.insert(view.order.id));
            }
        }
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn zero_page_or_limit_is_rejected() {
        let f = fixture().await;
        let limits = PageLimits::default();

        for request in [
            PageRequest {
                page: Some(0),
                limit: None,
            },
            PageRequest {
                page: None,
                limit: Some(0),
            },
        ] {
            let err = list_orders(&f.store, &f.directory, &f.admin, request, &limits)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn courier_views_hide_the_code() {
        let f = fixture().await;
        let mut order = DeliveryOrder::new(f.alice.id, details());
        order.assigned_courier = Some(f.courier.id);
        order.delivery_otp = Some("4821".to_string());
        f.store.insert(order).await.unwrap();

        let request = PageRequest {
            page: Some(1),
            limit: Some(1),
        };
        let limits = PageLimits::default();
        let courier = list_orders(&f.store, &f.directory, &f.courier, request, &limits)
            .await
            .unwrap();
        assert!(courier.orders[0].order.delivery_otp.is_none());

        let owner = list_orders(&f.store, &f.directory, &f.alice, request, &limits)
            .await
            .unwrap();
        assert_eq!(owner.orders[0].order.delivery_otp.as_deref(), Some("4821"));
    }
}
