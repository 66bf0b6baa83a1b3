//! The order state machine.
//!
//! `pending -> accepted -> en_route -> delivered`, with `cancelled`
//! reachable from any non-terminal state. Transitions are role-gated
//! and all-or-nothing: a rejected request leaves the order untouched.
//!
//! Edge validity is checked before actor permissions, so an impossible
//! transition reports `InvalidTransition` regardless of who asks, and a
//! possible one requested by the wrong party reports a generic 403.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

use crate::auth::{Principal, Role};

use super::{Order, OrderStatus, TransitionRequest};

fn invalid(from: OrderStatus, to: OrderStatus) -> EntregaError {
    EntregaError::InvalidTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

fn forbidden() -> EntregaError {
    EntregaError::Forbidden("access denied".to_string())
}

/// Validate and apply a status transition, returning the updated order.
///
/// The input order is not mutated; the caller persists the returned
/// copy (and only then broadcasts).
pub fn apply(
    order: &Order,
    req: &TransitionRequest,
    actor: &Principal,
    now: DateTime<Utc>,
) -> EntregaResult<Order> {
    let from = order.status;
    let to = req.status;

    if from.is_terminal() {
        return Err(invalid(from, to));
    }

    // Courier assignment rides only on the acceptance edge; admin
    // reassignment goes through `assign_courier`.
    if req.courier_id.is_some() && !(from == OrderStatus::Pending && to == OrderStatus::Accepted) {
        return Err(EntregaError::InvalidParameter {
            param: "courier_id".to_string(),
            reason: "courier is only assignable when accepting an order".to_string(),
        });
    }

    let mut updated = order.clone();

    match (from, to) {
        (OrderStatus::Pending, OrderStatus::Accepted) => {
            if actor.role != Role::Merchant || actor.id != order.merchant_id {
                return Err(forbidden());
            }
            updated.status = OrderStatus::Accepted;
            updated.accepted_at = Some(now);
            updated.courier_id = req.courier_id;
        },

        (OrderStatus::Accepted, OrderStatus::EnRoute) => {
            if actor.role != Role::Courier || order.courier_id != Some(actor.id) {
                return Err(forbidden());
            }
            updated.status = OrderStatus::EnRoute;
            updated.en_route_at = Some(now);
        },

        (OrderStatus::EnRoute, OrderStatus::Delivered) => {
            if actor.role != Role::Courier || order.courier_id != Some(actor.id) {
                return Err(forbidden());
            }
            updated.status = OrderStatus::Delivered;
            updated.delivered_at = Some(now);
        },

        (_, OrderStatus::Cancelled) => {
            let allowed = match actor.role {
                // Clients may only back out while the order is untouched.
                Role::Client => actor.id == order.client_id && from == OrderStatus::Pending,
                Role::Merchant => actor.id == order.merchant_id,
                Role::Admin => true,
                Role::Courier => false,
            };
            if !allowed {
                return Err(forbidden());
            }
            updated.status = OrderStatus::Cancelled;
            updated.cancelled_at = Some(now);
        },

        _ => return Err(invalid(from, to)),
    }

    Ok(updated)
}

/// Admin-only courier (re)assignment after acceptance.
pub fn assign_courier(
    order: &Order,
    courier_id: Uuid,
    actor: &Principal,
) -> EntregaResult<Order> {
    if actor.role != Role::Admin {
        return Err(forbidden());
    }
    if !matches!(order.status, OrderStatus::Accepted | OrderStatus::EnRoute) {
        return Err(EntregaError::Validation(format!(
            "courier cannot be reassigned while order is {}",
            order.status
        )));
    }
    let mut updated = order.clone();
    updated.courier_id = Some(courier_id);
    Ok(updated)
}
