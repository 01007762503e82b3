//! Client order records.
//!
//! # Invariants
//! - An order has at least one item; each item quantity is positive.
//! - Status moves `pending -> confirmed -> delivered`; `pending` and
//!   `confirmed` orders may be cancelled. `delivered` and `cancelled` are
//!   terminal.

use super::{ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Delivered)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        )
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order cannot move from {} to {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl Error for InvalidTransition {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: RecordId,
    pub quantity: i64,
    /// Price snapshot taken when the order was placed.
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: RecordId,
    pub client_id: RecordId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Creates a pending order with a generated stable ID.
    pub fn new(client_id: RecordId, items: Vec<OrderItem>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            client_id,
            status: OrderStatus::Pending,
            note: None,
            items,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.items.is_empty() {
            return Err(ModelValidationError::NoItems);
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ModelValidationError::NonPositiveQuantity(item.product_id));
            }
            if item.unit_price_cents < 0 {
                return Err(ModelValidationError::NegativeAmount("unit price"));
            }
        }
        Ok(())
    }

    pub fn total_cents(&self) -> i64 {
        self.items.iter().fold(0_i64, |total, item| {
            total.saturating_add(item.quantity.saturating_mul(item.unit_price_cents))
        })
    }

    /// Applies a status change if the lifecycle allows it.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Order, OrderItem, OrderStatus};
    use crate::model::ModelValidationError;
    use uuid::Uuid;

    fn item(quantity: i64, unit_price_cents: i64) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn total_sums_lines() {
        let order = Order::new(Uuid::new_v4(), vec![item(2, 150), item(3, 1_000)]);
        assert_eq!(order.total_cents(), 3_300);
    }

    #[test]
    fn empty_order_is_rejected() {
        let order = Order::new(Uuid::new_v4(), Vec::new());
        assert_eq!(order.validate(), Err(ModelValidationError::NoItems));
    }

    #[test]
    fn lifecycle_rejects_reopening() {
        let mut order = Order::new(Uuid::new_v4(), vec![item(1, 10)]);
        order.transition(OrderStatus::Confirmed).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        let err = order.transition(OrderStatus::Cancelled).unwrap_err();
        assert_eq!(err.from, OrderStatus::Delivered);
        assert_eq!(order.status, OrderStatus::Delivered);
    }
}
