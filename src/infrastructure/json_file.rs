use crate::domain::intent::{IntentId, PaymentIntent};
use crate::domain::order::{NotificationId, Order, OrderId, OrderNotification};
use crate::domain::ports::{IntentStore, NotificationStore, OrderStore, TransactionRecordStore};
use crate::domain::transaction::{Address, Receipt, TransactionRecord, TxId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Namespace for payer-side transaction records.
pub const NS_TRANSACTIONS: &str = "transactions";
/// Namespace for payment intents (the payee-side ledger of requested payments).
pub const NS_INTENTS: &str = "vendor_transactions";
/// Namespace for orders.
pub const NS_ORDERS: &str = "orders";
/// Namespace for the persisted order notification log.
pub const NS_NOTIFICATIONS: &str = "notifications";

/// A durable store writing one JSON document per namespace.
///
/// Amounts are encoded as exact-precision strings and timestamps as ISO-8601,
/// both via the domain types' serde representations. A corrupt or unreadable
/// document degrades to an empty collection at open time; it is logged, never
/// fatal.
///
/// The full collection is kept in memory and rewritten on every mutation,
/// which matches the scale of a per-device payment history. `Clone` shares the
/// underlying state.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    transactions: Arc<RwLock<HashMap<TxId, TransactionRecord>>>,
    intents: Arc<RwLock<HashMap<IntentId, PaymentIntent>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    notifications: Arc<RwLock<Vec<OrderNotification>>>,
}

impl JsonFileStore {
    /// Opens (or initializes) the store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let transactions: Vec<TransactionRecord> = load_namespace(&dir, NS_TRANSACTIONS);
        let intents: Vec<PaymentIntent> = load_namespace(&dir, NS_INTENTS);
        let orders: Vec<Order> = load_namespace(&dir, NS_ORDERS);
        let notifications: Vec<OrderNotification> = load_namespace(&dir, NS_NOTIFICATIONS);

        Ok(Self {
            dir,
            transactions: Arc::new(RwLock::new(
                transactions.into_iter().map(|r| (r.id.clone(), r)).collect(),
            )),
            intents: Arc::new(RwLock::new(
                intents.into_iter().map(|i| (i.id.clone(), i)).collect(),
            )),
            orders: Arc::new(RwLock::new(
                orders.into_iter().map(|o| (o.id.clone(), o)).collect(),
            )),
            notifications: Arc::new(RwLock::new(notifications)),
        })
    }

    fn persist<T: Serialize>(&self, namespace: &str, items: &[T]) -> Result<()> {
        let path = namespace_path(&self.dir, namespace);
        let bytes = serde_json::to_vec_pretty(items)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Rewrites every namespace. Called on engine teardown.
    pub async fn flush_all(&self) -> Result<()> {
        TransactionRecordStore::flush(self).await?;
        IntentStore::flush(self).await?;
        OrderStore::flush(self).await?;
        NotificationStore::flush(self).await?;
        Ok(())
    }
}

fn namespace_path(dir: &Path, namespace: &str) -> PathBuf {
    dir.join(format!("{namespace}.json"))
}

/// Loads a namespace document, degrading to empty on corruption.
fn load_namespace<T: DeserializeOwned>(dir: &Path, namespace: &str) -> Vec<T> {
    let path = namespace_path(dir, namespace);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!(namespace, error = %err, "failed to read namespace, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(err) => {
            let corrupt = PaymentError::PersistenceCorrupt {
                namespace: namespace.to_string(),
                reason: err.to_string(),
            };
            tracing::warn!(error = %corrupt, "recovering with empty collection");
            Vec::new()
        }
    }
}

#[async_trait]
impl TransactionRecordStore for JsonFileStore {
    async fn store(&self, record: TransactionRecord) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(record.id.clone(), record);
        let items: Vec<_> = transactions.values().cloned().collect();
        self.persist(NS_TRANSACTIONS, &items)
    }

    async fn get(&self, id: &TxId) -> Result<Option<TransactionRecord>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(id).cloned())
    }

    async fn get_by_receipt(&self, receipt: &Receipt) -> Result<Option<TransactionRecord>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .find(|rec| rec.receipt.as_ref() == Some(receipt))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<TransactionRecord>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().cloned().collect())
    }

    async fn flush(&self) -> Result<()> {
        let transactions = self.transactions.read().await;
        let items: Vec<_> = transactions.values().cloned().collect();
        self.persist(NS_TRANSACTIONS, &items)
    }
}

#[async_trait]
impl IntentStore for JsonFileStore {
    async fn store(&self, intent: PaymentIntent) -> Result<()> {
        let mut intents = self.intents.write().await;
        intents.insert(intent.id.clone(), intent);
        let items: Vec<_> = intents.values().cloned().collect();
        self.persist(NS_INTENTS, &items)
    }

    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        let intents = self.intents.read().await;
        Ok(intents.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<PaymentIntent>> {
        let intents = self.intents.read().await;
        Ok(intents.values().cloned().collect())
    }

    async fn flush(&self) -> Result<()> {
        let intents = self.intents.read().await;
        let items: Vec<_> = intents.values().cloned().collect();
        self.persist(NS_INTENTS, &items)
    }
}

#[async_trait]
impl OrderStore for JsonFileStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order);
        let items: Vec<_> = orders.values().cloned().collect();
        self.persist(NS_ORDERS, &items)
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

    async fn flush(&self) -> Result<()> {
        let orders = self.orders.read().await;
        let items: Vec<_> = orders.values().cloned().collect();
        self.persist(NS_ORDERS, &items)
    }
}

#[async_trait]
impl NotificationStore for JsonFileStore {
    async fn append(&self, notification: OrderNotification) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        self.persist(NS_NOTIFICATIONS, &notifications[..])
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
        self.persist(NS_NOTIFICATIONS, &notifications[..])
    }

    async fn flush(&self) -> Result<()> {
        let notifications = self.notifications.read().await;
        self.persist(NS_NOTIFICATIONS, &notifications[..])
    }
}
