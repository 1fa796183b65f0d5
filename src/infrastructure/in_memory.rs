use crate::domain::intent::{IntentId, PaymentIntent};
use crate::domain::order::{NotificationId, Order, OrderId, OrderNotification};
use crate::domain::ports::{IntentStore, NotificationStore, OrderStore, TransactionRecordStore};
use crate::domain::transaction::{Address, Receipt, TransactionRecord, TxId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for transaction records.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access. Ideal for
/// tests and short-lived sessions where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    records: Arc<RwLock<HashMap<TxId, TransactionRecord>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRecordStore for InMemoryTransactionStore {
    async fn store(&self, record: TransactionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &TxId) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn get_by_receipt(&self, receipt: &Receipt) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|rec| rec.receipt.as_ref() == Some(receipt))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryIntentStore {
    intents: Arc<RwLock<HashMap<IntentId, PaymentIntent>>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn store(&self, intent: PaymentIntent) -> Result<()> {
        let mut intents = self.intents.write().await;
        intents.insert(intent.id.clone(), intent);
        Ok(())
    }

    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        let intents = self.intents.read().await;
        Ok(intents.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<PaymentIntent>> {
        let intents = self.intents.read().await;
        Ok(intents.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn for_payee(&self, payee: &Address) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|order| &order.payee == payee)
            .cloned()
            .collect())
    }
}

/// Insertion order doubles as the notification log order.
#[derive(Default, Clone)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<Vec<OrderNotification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn append(&self, notification: OrderNotification) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        Ok(())
    }

    async fn for_payee(&self, payee: &Address) -> Result<Vec<OrderNotification>> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| &n.payee == payee)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let found = notifications
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        found.read = true;
        Ok(())
    }
}
