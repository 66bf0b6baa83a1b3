//! Order domain: model, state machine, persistence seam and service.

pub mod service;
pub mod state;
pub mod store;

use chrono::{DateTime, Utc};
use errors::EntregaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle states.
///
/// `Delivered` and `Cancelled` are terminal; every other progression is
/// monotonic (see [`state::apply`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    EnRoute,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::EnRoute => "en_route",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = EntregaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            "en_route" => Ok(OrderStatus::EnRoute),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(EntregaError::InvalidParameter {
                param: "status".to_string(),
                reason: format!("unknown status: {}", other),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub merchant_id: Uuid,
    /// Set at acceptance (or by admin reassignment); never before
    pub courier_id: Option<Uuid>,
    pub city: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en_route_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version, bumped by the store on save
    pub version: u64,
}

impl Order {
    pub fn new(
        client_id: Uuid,
        merchant_id: Uuid,
        city: String,
        items: Vec<OrderItem>,
    ) -> Self {
        let total_cents = items
            .iter()
            .map(|item| item.unit_price_cents * item.quantity as i64)
            .sum();
        Self {
            id: Uuid::new_v4(),
            client_id,
            merchant_id,
            courier_id: None,
            city,
            status: OrderStatus::Pending,
            items,
            total_cents,
            created_at: Utc::now(),
            accepted_at: None,
            en_route_at: None,
            delivered_at: None,
            cancelled_at: None,
            version: 0,
        }
    }

    /// Whether the principal id belongs to one of the order's parties.
    pub fn is_participant(&self, id: Uuid) -> bool {
        self.client_id == id || self.merchant_id == id || self.courier_id == Some(id)
    }
}

/// A requested status change, as it arrives from the API.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    /// Only meaningful on `pending -> accepted`
    pub courier_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_items() {
        let order = Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Madrid".into(),
            vec![
                OrderItem {
                    name: "empanada".into(),
                    quantity: 3,
                    unit_price_cents: 250,
                },
                OrderItem {
                    name: "agua".into(),
                    quantity: 1,
                    unit_price_cents: 120,
                },
            ],
        );
        assert_eq!(order.total_cents, 870);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 0);
    }

    #[test]
    fn status_parses_and_rejects_unknown() {
        assert_eq!("en_route".parse::<OrderStatus>().unwrap(), OrderStatus::EnRoute);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::EnRoute.is_terminal());
    }
}
