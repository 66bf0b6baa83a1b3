//! Order persistence seam.
//!
//! The gateway talks to storage through [`OrderStore`] only. The
//! in-memory implementation backs tests and single-instance
//! deployments; a relational store can be swapped in behind the same
//! trait, keeping the version-checked save semantics.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

use super::Order;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load(&self, id: Uuid) -> EntregaResult<Option<Order>>;

    /// Insert a fresh order. Fails if the id already exists.
    async fn insert(&self, order: Order) -> EntregaResult<()>;

    /// Persist an updated order. The stored version must equal
    /// `order.version` or the save fails with `VersionConflict`; on
    /// success the version is bumped and the stored copy returned.
    async fn save(&self, order: Order) -> EntregaResult<Order>;

    async fn list(&self) -> EntregaResult<Vec<Order>>;
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<Uuid, Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn load(&self, id: Uuid) -> EntregaResult<Option<Order>> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, order: Order) -> EntregaResult<()> {
        match self.orders.entry(order.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EntregaError::AlreadyExists {
                resource: format!("order {}", order.id),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            },
        }
    }

    async fn save(&self, mut order: Order) -> EntregaResult<Order> {
        match self.orders.entry(order.id) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().version != order.version {
                    return Err(EntregaError::VersionConflict {
                        resource: format!("order {}", order.id),
                    });
                }
                order.version += 1;
                slot.insert(order.clone());
                Ok(order)
            },
            dashmap::mapref::entry::Entry::Vacant(_) => Err(EntregaError::NotFound {
                resource: format!("order {}", order.id),
            }),
        }
    }

    async fn list(&self) -> EntregaResult<Vec<Order>> {
        Ok(self.orders.iter().map(|entry| entry.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{OrderItem, OrderStatus};

    fn order() -> Order {
        Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Sevilla".into(),
            vec![OrderItem {
                name: "gazpacho".into(),
                quantity: 2,
                unit_price_cents: 450,
            }],
        )
    }

    #[tokio::test]
    async fn insert_then_load_roundtrip() {
        let store = MemoryOrderStore::new();
        let order = order();
        let id = order.id;

        store.insert(order).await.unwrap();
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryOrderStore::new();
        let order = order();
        store.insert(order.clone()).await.unwrap();
        assert!(matches!(
            store.insert(order).await,
            Err(EntregaError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn save_bumps_version() {
        let store = MemoryOrderStore::new();
        let mut order = order();
        store.insert(order.clone()).await.unwrap();

        order.status = OrderStatus::Cancelled;
        let saved = store.save(order).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(saved.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let store = MemoryOrderStore::new();
        let order = order();
        store.insert(order.clone()).await.unwrap();

        // First writer wins.
        store.save(order.clone()).await.unwrap();

        // Second writer still holds version 0.
        assert!(matches!(
            store.save(order).await,
            Err(EntregaError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn save_of_unknown_order_is_not_found() {
        let store = MemoryOrderStore::new();
        assert!(matches!(
            store.save(order()).await,
            Err(EntregaError::NotFound { .. })
        ));
    }
}
