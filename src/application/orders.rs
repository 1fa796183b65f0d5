use crate::domain::intent::IntentId;
use crate::domain::order::{
    LineItem, NotificationId, NotificationKind, Order, OrderId, OrderNotification, OrderStatus,
};
use crate::domain::ports::{NotificationStoreRef, OrderStoreRef};
use crate::domain::transaction::Address;
use crate::error::{PaymentError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Payee-side order lifecycle. Every creation and status change appends a
/// persisted notification to the per-payee log, independent of the transient
/// pub/sub hub.
pub struct OrderService {
    orders: OrderStoreRef,
    notifications: NotificationStoreRef,
    fee_rate: Decimal,
    ready_buffer: Duration,
}

impl OrderService {
    /// Fixed percentage surcharge on the subtotal.
    pub const DEFAULT_FEE_RATE: Decimal = dec!(0.02);
    /// Slack added on top of the slowest line item's preparation time.
    pub const DEFAULT_READY_BUFFER_MINUTES: i64 = 5;

    pub fn new(orders: OrderStoreRef, notifications: NotificationStoreRef) -> Self {
        Self {
            orders,
            notifications,
            fee_rate: Self::DEFAULT_FEE_RATE,
            ready_buffer: Duration::minutes(Self::DEFAULT_READY_BUFFER_MINUTES),
        }
    }

    pub async fn create(&self, payee: Address, items: Vec<LineItem>) -> Result<Order> {
        let order = Order::place(payee, items, self.fee_rate, self.ready_buffer)?;
        self.orders.store(order.clone()).await?;
        self.notify(
            &order,
            NotificationKind::OrderPlaced,
            format!("New order for {} placed", order.total),
        )
        .await?;
        tracing::info!(id = %order.id, total = %order.total, "order placed");
        Ok(order)
    }

    pub async fn get(&self, id: &OrderId) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }

    pub async fn for_payee(&self, payee: &Address) -> Result<Vec<Order>> {
        self.orders.for_payee(payee).await
    }

    /// Applies a legal status transition and logs it.
    pub async fn advance(&self, id: &OrderId, next: OrderStatus) -> Result<Order> {
        let mut order = self.get(id).await?;
        order.transition_to(next)?;
        self.orders.store(order.clone()).await?;
        self.notify(
            &order,
            NotificationKind::OrderUpdated,
            format!("Order is now {}", order.status),
        )
        .await?;
        tracing::info!(id = %order.id, status = %order.status, "order advanced");
        Ok(order)
    }

    /// Payment-completion signal: moves `Placed` to `Paid` and links the
    /// intent that paid for the order.
    pub async fn mark_paid(&self, id: &OrderId, intent_id: &IntentId) -> Result<Order> {
        let mut order = self.get(id).await?;
        order.transition_to(OrderStatus::Paid)?;
        order.intent_id = Some(intent_id.clone());
        self.orders.store(order.clone()).await?;
        self.notify(
            &order,
            NotificationKind::OrderUpdated,
            format!("Payment of {} received", order.total),
        )
        .await?;
        tracing::info!(id = %order.id, intent = %intent_id, "order paid");
        Ok(order)
    }

    pub async fn list_unread(&self, payee: &Address) -> Result<Vec<OrderNotification>> {
        Ok(self
            .notifications
            .for_payee(payee)
            .await?
            .into_iter()
            .filter(|n| !n.read)
            .collect())
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.notifications.mark_read(id).await
    }

    async fn notify(
        &self,
        order: &Order,
        kind: NotificationKind,
        message: String,
    ) -> Result<()> {
        self.notifications
            .append(OrderNotification::new(order, kind, message))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::infrastructure::in_memory::{InMemoryNotificationStore, InMemoryOrderStore};
    use std::sync::Arc;

    fn service() -> OrderService {
        OrderService::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryNotificationStore::new()),
        )
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("espresso", Amount::new(dec!(0.025)).unwrap(), 1, 4),
            LineItem::new("croissant", Amount::new(dec!(0.03)).unwrap(), 2, 10),
        ]
    }

    #[tokio::test]
    async fn test_create_computes_totals_and_logs() {
        let service = service();
        let order = service.create(Address::new("V1"), items()).await.unwrap();
        assert_eq!(order.subtotal, dec!(0.085));
        assert_eq!(order.fee, dec!(0.0017));
        assert_eq!(order.total, dec!(0.0867));

        let unread = service.list_unread(&Address::new("V1")).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, NotificationKind::OrderPlaced);
    }

    #[tokio::test]
    async fn test_every_transition_appends_notification() {
        let service = service();
        let order = service.create(Address::new("V1"), items()).await.unwrap();
        let intent = IntentId::generate();
        service.mark_paid(&order.id, &intent).await.unwrap();
        service
            .advance(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let unread = service.list_unread(&Address::new("V1")).await.unwrap();
        assert_eq!(unread.len(), 3);

        service.mark_read(&unread[0].id).await.unwrap();
        let unread = service.list_unread(&Address::new("V1")).await.unwrap();
        assert_eq!(unread.len(), 2);
    }

    #[tokio::test]
    async fn test_illegal_advance_rejected_and_unchanged() {
        let service = service();
        let order = service.create(Address::new("V1"), items()).await.unwrap();

        let err = service
            .advance(&order.id, OrderStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidTransition { .. }));

        let stored = service.get(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Placed);
        // The rejected transition is not logged either.
        assert_eq!(
            service.list_unread(&Address::new("V1")).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_mark_paid_links_intent() {
        let service = service();
        let order = service.create(Address::new("V1"), items()).await.unwrap();
        let intent = IntentId::generate();
        let paid = service.mark_paid(&order.id, &intent).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.intent_id, Some(intent));
    }

    #[tokio::test]
    async fn test_cancel_from_preparing() {
        let service = service();
        let order = service.create(Address::new("V1"), items()).await.unwrap();
        service.mark_paid(&order.id, &IntentId::generate()).await.unwrap();
        service.advance(&order.id, OrderStatus::Confirmed).await.unwrap();
        service.advance(&order.id, OrderStatus::Preparing).await.unwrap();
        let cancelled = service
            .advance(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }
}
