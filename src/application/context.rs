use crate::application::hub::{NotificationHub, StatusEvent};
use crate::application::intents::IntentService;
use crate::application::merger::ReconciliationMerger;
use crate::application::orders::OrderService;
use crate::application::tracker::{PollConfig, StatusTracker};
use crate::domain::intent::{IntentId, IntentStatus, PaymentIntent};
use crate::domain::order::{LineItem, Order, OrderId};
use crate::domain::money::Amount;
use crate::domain::ports::{
    IntentStoreRef, LedgerGatewayRef, NotificationStoreRef, OrderStoreRef, Transfer,
    TransactionStoreRef,
};
use crate::domain::transaction::{Address, Direction, StatusUpdate, TxId, TxStatus};
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::{
    InMemoryIntentStore, InMemoryNotificationStore, InMemoryOrderStore, InMemoryTransactionStore,
};
use crate::infrastructure::json_file::JsonFileStore;
use chrono::Duration;
use std::path::Path;
use std::sync::Arc;

/// Storage backends wired into an [`EngineContext`].
pub struct EngineStores {
    pub records: TransactionStoreRef,
    pub intents: IntentStoreRef,
    pub orders: OrderStoreRef,
    pub notifications: NotificationStoreRef,
}

impl EngineStores {
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(InMemoryTransactionStore::new()),
            intents: Arc::new(InMemoryIntentStore::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            notifications: Arc::new(InMemoryNotificationStore::new()),
        }
    }

    /// Durable JSON-file persistence rooted at `dir`.
    pub fn json_file<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let store = JsonFileStore::open(dir)?;
        Ok(Self {
            records: Arc::new(store.clone()),
            intents: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            notifications: Arc::new(store),
        })
    }
}

/// The explicitly constructed, explicitly owned engine: one shared service
/// instance holding records, subscriptions and poll tasks, with a defined
/// teardown. Passed to callers instead of living as a global.
pub struct EngineContext {
    stores: EngineStores,
    gateway: LedgerGatewayRef,
    hub: Arc<NotificationHub>,
    tracker: StatusTracker,
    merger: ReconciliationMerger,
    intents: Arc<IntentService>,
    orders: Arc<OrderService>,
}

impl EngineContext {
    pub fn new(gateway: LedgerGatewayRef, stores: EngineStores, config: PollConfig) -> Self {
        Self::with_intent_ttl(
            gateway,
            stores,
            config,
            Duration::minutes(IntentService::DEFAULT_TTL_MINUTES),
        )
    }

    pub fn with_intent_ttl(
        gateway: LedgerGatewayRef,
        stores: EngineStores,
        config: PollConfig,
        intent_ttl: Duration,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new());
        let tracker = StatusTracker::new(
            Arc::clone(&stores.records),
            Arc::clone(&gateway),
            Arc::clone(&hub),
            config,
        );
        let merger = ReconciliationMerger::new(Arc::clone(&stores.records), Arc::clone(&gateway));
        let intents = Arc::new(IntentService::with_ttl(
            Arc::clone(&stores.intents),
            Arc::clone(&stores.records),
            intent_ttl,
        ));
        let orders = Arc::new(OrderService::new(
            Arc::clone(&stores.orders),
            Arc::clone(&stores.notifications),
        ));
        Self {
            stores,
            gateway,
            hub,
            tracker,
            merger,
            intents,
            orders,
        }
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn merger(&self) -> &ReconciliationMerger {
        &self.merger
    }

    pub fn intents(&self) -> &IntentService {
        &self.intents
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub async fn balance(&self, address: &Address) -> Result<rust_decimal::Decimal> {
        self.gateway.get_balance(address).await
    }

    /// Submits an outgoing transfer and tracks it: the record starts Pending
    /// with the submission receipt attached, and the poller carries it to
    /// Confirmed/Finalized. If the gateway rejects the submission the record
    /// is marked Failed and the error is returned to the caller.
    pub async fn send_payment(
        &self,
        recipient: Address,
        amount: Amount,
        memo: impl Into<String>,
    ) -> Result<TxId> {
        let memo = memo.into();
        let tx_id = self
            .tracker
            .create_transaction(recipient.clone(), amount, Direction::Outgoing, memo.clone())
            .await?;
        let transfer = Transfer {
            recipient,
            amount,
            memo: Some(memo),
        };
        match self.gateway.submit(transfer).await {
            Ok(receipt) => {
                self.tracker.attach_receipt(&tx_id, receipt).await?;
                self.tracker.monitor(&tx_id, None).await?;
                Ok(tx_id)
            }
            Err(err) => {
                self.tracker
                    .update_status(&tx_id, StatusUpdate::Failed, None)
                    .await?;
                Err(err)
            }
        }
    }

    /// Creates an order together with the payment intent covering its total,
    /// and puts the intent under ledger watch. When a matching transfer
    /// confirms, the intent completes and the order is marked paid.
    pub async fn place_order(
        &self,
        payee: Address,
        items: Vec<LineItem>,
    ) -> Result<(Order, PaymentIntent, TxId)> {
        let order = self.orders.create(payee.clone(), items).await?;
        let amount = Amount::new(order.total)?;
        let intent = self
            .intents
            .create(payee, amount, format!("Order {}", order.id))
            .await?;
        let tx_id = self
            .watch_intent_inner(&intent.id, Some(order.id.clone()))
            .await?;
        Ok((order, intent, tx_id))
    }

    /// Registers a pending incoming record for an active intent and starts
    /// polling the ledger for a matching transfer; the intent's expiry is the
    /// polling deadline. Returns the id of the watching record.
    pub async fn watch_intent(&self, intent_id: &IntentId) -> Result<TxId> {
        self.watch_intent_inner(intent_id, None).await
    }

    async fn watch_intent_inner(
        &self,
        intent_id: &IntentId,
        order_id: Option<OrderId>,
    ) -> Result<TxId> {
        let intent = self.intents.get(intent_id).await?;
        intent.ensure_active(IntentStatus::Completed)?;

        let tx_id = self
            .tracker
            .create_transaction(
                intent.payee.clone(),
                intent.amount,
                Direction::Incoming,
                intent.description.clone(),
            )
            .await?;

        let intents = Arc::clone(&self.intents);
        let orders = Arc::clone(&self.orders);
        let watched_intent = intent_id.clone();
        let watched_tx = tx_id.clone();
        self.tracker
            .subscribe(
                &tx_id,
                Arc::new(move |event: &StatusEvent| {
                    if !matches!(event.status, TxStatus::Confirmed | TxStatus::Finalized) {
                        return;
                    }
                    let Some(receipt) = event.receipt.clone() else {
                        return;
                    };
                    let intents = Arc::clone(&intents);
                    let orders = Arc::clone(&orders);
                    let intent_id = watched_intent.clone();
                    let tx_id = watched_tx.clone();
                    let order_id = order_id.clone();
                    tokio::spawn(async move {
                        match intents
                            .complete_linked(&intent_id, receipt, Some(tx_id))
                            .await
                        {
                            Ok(completed) => {
                                if let Some(order_id) = order_id
                                    && let Err(err) =
                                        orders.mark_paid(&order_id, &completed.id).await
                                {
                                    tracing::debug!(
                                        order = %order_id,
                                        error = %err,
                                        "order already paid, event ignored"
                                    );
                                }
                            }
                            Err(PaymentError::InvalidTransition { .. }) => {
                                // A second Confirmed/Finalized event for an
                                // already-completed intent.
                            }
                            Err(err) => {
                                tracing::warn!(
                                    intent = %intent_id,
                                    error = %err,
                                    "intent completion from ledger event failed"
                                );
                            }
                        }
                    });
                }),
            )
            .await?;

        self.tracker.monitor(&tx_id, Some(intent.expires_at)).await?;
        Ok(tx_id)
    }

    /// Teardown: cancels every poll task and flushes the stores.
    pub async fn shutdown(self) -> Result<()> {
        self.tracker.stop_all();
        self.stores.records.flush().await?;
        self.stores.intents.flush().await?;
        self.stores.orders.flush().await?;
        self.stores.notifications.flush().await?;
        Ok(())
    }
}
