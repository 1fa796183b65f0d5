use crate::domain::intent::IntentId;
use crate::domain::money::Amount;
use crate::domain::transaction::Address;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payee-side order progression. `Cancelled` and `Refunded` are reachable from
/// any state before `PickedUp`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Paid,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::PickedUp | Self::Cancelled | Self::Refunded)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled | Self::Refunded => true,
            _ => matches!(
                (self, next),
                (Self::Placed, Self::Paid)
                    | (Self::Paid, Self::Confirmed)
                    | (Self::Confirmed, Self::Preparing)
                    | (Self::Preparing, Self::Ready)
                    | (Self::Ready, Self::PickedUp)
            ),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Placed => "placed",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::PickedUp => "picked_up",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        write!(f, "{name}")
    }
}

/// A catalog line item: unit price times quantity, plus how long it takes to
/// prepare.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LineItem {
    pub name: String,
    pub price: Amount,
    pub quantity: u32,
    pub prep_minutes: i64,
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: Amount, quantity: u32, prep_minutes: i64) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
            prep_minutes,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price.value() * Decimal::from(self.quantity)
    }
}

/// A payee-side order binding line items to a single payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub payee: Address,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub estimated_ready_at: DateTime<Utc>,
    /// The intent paying for this order; set when the order is marked paid.
    pub intent_id: Option<IntentId>,
}

impl Order {
    /// Creates a `Placed` order, deriving subtotal, fee and total with exact
    /// decimal arithmetic and the ready estimate from the slowest item.
    pub fn place(
        payee: Address,
        items: Vec<LineItem>,
        fee_rate: Decimal,
        ready_buffer: Duration,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(PaymentError::ValidationError(
                "order must contain at least one line item".to_string(),
            ));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(PaymentError::ValidationError(
                "line item quantity must be at least 1".to_string(),
            ));
        }

        let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();
        let fee = subtotal * fee_rate;
        let total = subtotal + fee;

        let created_at = Utc::now();
        let max_prep = items
            .iter()
            .map(|item| item.prep_minutes)
            .max()
            .unwrap_or(0);

        Ok(Self {
            id: OrderId::generate(),
            payee,
            items,
            subtotal,
            fee,
            total,
            status: OrderStatus::Placed,
            created_at,
            estimated_ready_at: created_at + Duration::minutes(max_prep) + ready_buffer,
            intent_id: None,
        })
    }

    /// Applies a status transition, rejecting illegal ones and leaving the
    /// order untouched on error.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderUpdated,
}

/// A persisted, per-payee notification fact. Unlike hub events these survive
/// the moment of delivery and can be read back later.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderNotification {
    pub id: NotificationId,
    pub payee: Address,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl OrderNotification {
    pub fn new(order: &Order, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: NotificationId::generate(),
            payee: order.payee.clone(),
            order_id: order.id.clone(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
            read: false,
        }
    }
}
