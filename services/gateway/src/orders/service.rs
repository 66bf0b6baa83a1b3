//! Order orchestration: serialize, validate, persist, fan out.
//!
//! Transitions on a single order are serialized through a per-id async
//! mutex, so a concurrent accept and cancel cannot both commit. The
//! store's version check is kept as a second line of defense for
//! multi-instance stores; a mutating save is never retried.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

use crate::auth::Principal;
use crate::notify::Notifier;
use crate::ws::hub::{city_room, order_room, Hub};

use super::state;
use super::store::OrderStore;
use super::{Order, OrderItem, TransitionRequest};

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    hub: Arc<Hub>,
    notifier: Arc<dyn Notifier>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, hub: Arc<Hub>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            hub,
            notifier,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create(
        &self,
        client: &Principal,
        merchant_id: Uuid,
        city: String,
        items: Vec<OrderItem>,
    ) -> EntregaResult<Order> {
        if items.is_empty() {
            return Err(EntregaError::Validation("order has no items".to_string()));
        }
        if city.trim().is_empty() {
            return Err(EntregaError::InvalidParameter {
                param: "city".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let order = Order::new(client.id, merchant_id, city, items);
        self.store.insert(order.clone()).await?;

        // New pending orders only interest the city room; the order
        // room has no subscribers yet.
        self.hub
            .broadcast(&city_room(&order.city), &event_payload(&order));
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> EntregaResult<Order> {
        // Idempotent read: retry once on a transient store failure.
        // Mutating saves are never retried.
        let loaded = match self.store.load(id).await {
            Ok(found) => found,
            Err(err) if err.is_retryable() => self.store.load(id).await?,
            Err(err) => return Err(err),
        };
        loaded.ok_or(EntregaError::NotFound {
            resource: format!("order {}", id),
        })
    }

    pub async fn list(&self) -> EntregaResult<Vec<Order>> {
        self.store.list().await
    }

    /// Apply a role-gated status transition.
    pub async fn transition(
        &self,
        id: Uuid,
        req: TransitionRequest,
        actor: &Principal,
    ) -> EntregaResult<Order> {
        let lock = self.lock_for(id);
        let saved = {
            let _guard = lock.lock().await;
            let order = self.store.load(id).await?.ok_or(EntregaError::NotFound {
                resource: format!("order {}", id),
            })?;
            let updated = state::apply(&order, &req, actor, Utc::now())?;
            self.store.save(updated).await?
        };

        // Terminal orders take no further transitions; drop the lock entry.
        if saved.status.is_terminal() {
            self.locks.remove(&id);
        }

        self.publish(&saved).await;
        Ok(saved)
    }

    /// Admin courier (re)assignment.
    pub async fn assign_courier(
        &self,
        id: Uuid,
        courier_id: Uuid,
        actor: &Principal,
    ) -> EntregaResult<Order> {
        let lock = self.lock_for(id);
        let saved = {
            let _guard = lock.lock().await;
            let order = self.store.load(id).await?.ok_or(EntregaError::NotFound {
                resource: format!("order {}", id),
            })?;
            let updated = state::assign_courier(&order, courier_id, actor)?;
            self.store.save(updated).await?
        };

        self.publish(&saved).await;
        Ok(saved)
    }

    async fn publish(&self, order: &Order) {
        let payload = event_payload(order);
        self.hub.broadcast(&order_room(order.id), &payload);
        self.hub.broadcast(&city_room(&order.city), &payload);

        if let Err(err) = self.notifier.order_updated(order).await {
            tracing::warn!(order_id = %order.id, error = %err, "notifier failed");
        }
    }
}

fn event_payload(order: &Order) -> String {
    json!({
        "type": "order_update",
        "order_id": order.id,
        "status": order.status.as_str(),
        "city": order.city,
        "courier_id": order.courier_id,
        "version": order.version,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}
