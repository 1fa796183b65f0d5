use crate::application::hub::{NotificationHub, StatusCallback, StatusEvent, SubscriptionHandle, Topic};
use crate::domain::money::Amount;
use crate::domain::ports::{LedgerGatewayRef, TransactionStoreRef};
use crate::domain::transaction::{
    Address, Direction, Receipt, StatusUpdate, TransactionRecord, TxId, TxStatus,
};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as RecordLock;
use tokio::task::JoinHandle;

/// Polling schedule and finality rule for monitored records.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first poll, allowing network propagation.
    pub initial_delay: Duration,
    /// Interval between polls until a terminal state is reached.
    pub interval: Duration,
    /// Confirmations required to promote `Confirmed` to `Finalized`.
    pub finality_depth: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            finality_depth: 1,
        }
    }
}

struct TrackerInner {
    records: TransactionStoreRef,
    gateway: LedgerGatewayRef,
    hub: Arc<NotificationHub>,
    config: PollConfig,
    /// One exclusive critical section per record id; every read-modify-write
    /// of a record goes through its lock.
    locks: Mutex<HashMap<TxId, Arc<RecordLock<()>>>>,
    /// Poll tasks keyed by record id, so stopping one is a lookup-and-cancel.
    polls: Mutex<HashMap<TxId, JoinHandle<()>>>,
}

/// Owns the in-process status of tracked payment records: drives polling
/// against the ledger gateway, applies the transition table, persists through
/// the record store and fans out status changes through the hub.
#[derive(Clone)]
pub struct StatusTracker {
    inner: Arc<TrackerInner>,
}

impl StatusTracker {
    pub fn new(
        records: TransactionStoreRef,
        gateway: LedgerGatewayRef,
        hub: Arc<NotificationHub>,
        config: PollConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                records,
                gateway,
                hub,
                config,
                locks: Mutex::new(HashMap::new()),
                polls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Allocates a `Pending` record with no receipt and persists it.
    /// Idempotency is the caller's responsibility.
    pub async fn create_transaction(
        &self,
        address: Address,
        amount: Amount,
        direction: Direction,
        description: impl Into<String>,
    ) -> Result<TxId> {
        let record = TransactionRecord::new(address, amount, direction, description);
        let id = record.id.clone();
        self.inner.records.store(record).await?;
        Ok(id)
    }

    pub async fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRecord>> {
        self.inner.records.get(id).await
    }

    /// Caller-driven transition. `Completed` is accepted from `Pending` only
    /// and lands in `Confirmed`; `Failed` from `Pending` or `Confirmed`.
    pub async fn update_status(
        &self,
        id: &TxId,
        update: StatusUpdate,
        receipt: Option<Receipt>,
    ) -> Result<TransactionRecord> {
        let lock = self.lock_for(id);
        let guard = lock.lock().await;

        let mut record = self
            .inner
            .records
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;

        let previous = record.status;
        let target = match update {
            StatusUpdate::Completed => TxStatus::Confirmed,
            StatusUpdate::Failed => TxStatus::Failed,
        };
        record.transition_to(target)?;
        if receipt.is_some() {
            record.receipt = receipt;
        }
        self.inner.records.store(record.clone()).await?;

        tracing::info!(id = %id, from = %previous, to = %record.status, "status updated");
        // Published while the record's lock is held, so concurrent transitions
        // on one id fan out in transition order. Callbacks are synchronous and
        // cannot re-enter the lock.
        self.publish(&record, Some(previous));
        drop(guard);

        if record.status.is_terminal() {
            self.stop_monitoring(id);
        }
        Ok(record)
    }

    /// Records the receipt the ledger handed back on submission. No status
    /// change; confirmation stays the poller's job.
    pub async fn attach_receipt(&self, id: &TxId, receipt: Receipt) -> Result<TransactionRecord> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut record = self
            .inner
            .records
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        record.receipt = Some(receipt);
        self.inner.records.store(record.clone()).await?;
        Ok(record)
    }

    /// Begins (or continues) polling the ledger for this record. Polling runs
    /// until a terminal state, the optional `deadline` expires the record, or
    /// the caller cancels via [`StatusTracker::stop_monitoring`].
    pub async fn monitor(&self, id: &TxId, deadline: Option<DateTime<Utc>>) -> Result<()> {
        let record = self
            .inner
            .records
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        if record.status.is_terminal() {
            return Ok(());
        }

        let mut polls = self.inner.polls.lock().expect("poll table poisoned");
        if polls.contains_key(id) {
            return Ok(());
        }
        let tracker = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tracker.poll_loop(task_id, deadline).await;
        });
        polls.insert(id.clone(), handle);
        Ok(())
    }

    /// Halts future polls for `id`. Idempotent; a no-op once the record is
    /// terminal or was never monitored.
    pub fn stop_monitoring(&self, id: &TxId) {
        let handle = {
            let mut polls = self.inner.polls.lock().expect("poll table poisoned");
            polls.remove(id)
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Cancels every poll task. Used at engine teardown.
    pub fn stop_all(&self) {
        let mut polls = self.inner.polls.lock().expect("poll table poisoned");
        for (_, handle) in polls.drain() {
            handle.abort();
        }
    }

    pub fn is_monitoring(&self, id: &TxId) -> bool {
        self.inner
            .polls
            .lock()
            .expect("poll table poisoned")
            .contains_key(id)
    }

    /// Registers a callback for every status change of `id`. The new
    /// subscriber immediately receives one synthetic current-state event so
    /// transitions applied before subscription are not missed.
    pub async fn subscribe(
        &self,
        id: &TxId,
        callback: StatusCallback,
    ) -> Result<SubscriptionHandle> {
        // Register first: a transition landing while the snapshot is read is
        // then delivered live, and the synthetic event at worst repeats it.
        let handle = self
            .inner
            .hub
            .subscribe(Topic::Transaction(id.clone()), Arc::clone(&callback));
        let record = match self.inner.records.get(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                handle.cancel();
                return Err(PaymentError::NotFound(id.to_string()));
            }
            Err(err) => {
                handle.cancel();
                return Err(err);
            }
        };
        callback(&Self::event_for(&record, None));
        Ok(handle)
    }

    async fn poll_loop(self, id: TxId, deadline: Option<DateTime<Utc>>) {
        tokio::time::sleep(self.inner.config.initial_delay).await;
        loop {
            if let Some(deadline) = deadline
                && Utc::now() >= deadline
            {
                // Expiry applies to records that never left Pending. A record
                // already Confirmed keeps polling towards finality.
                match self.expire_if_pending(&id).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(id = %id, error = %err, "expiry check failed, will retry");
                        tokio::time::sleep(self.inner.config.interval).await;
                        continue;
                    }
                }
            }
            match self.poll_once(&id).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => {
                    // Transient gateway trouble is absorbed here; subscribers
                    // only ever see forward transitions.
                    tracing::warn!(id = %id, error = %err, "gateway poll failed, will retry");
                }
            }
            tokio::time::sleep(self.inner.config.interval).await;
        }
        self.inner
            .polls
            .lock()
            .expect("poll table poisoned")
            .remove(&id);
    }

    /// One confirmation query plus any resulting transitions. Returns `true`
    /// once the record is terminal (or gone) and polling should stop.
    async fn poll_once(&self, id: &TxId) -> Result<bool> {
        let Some(snapshot) = self.inner.records.get(id).await? else {
            return Ok(true);
        };
        if snapshot.status.is_terminal() {
            return Ok(true);
        }

        // The gateway call happens outside the record lock; the transition is
        // re-validated against a fresh read below.
        let confirmation = self
            .inner
            .gateway
            .query_confirmation(&snapshot.address, snapshot.amount, snapshot.created_at)
            .await?;

        if !confirmation.found {
            if snapshot.status == TxStatus::Confirmed {
                tracing::warn!(
                    id = %id,
                    "confirmed transfer no longer reported by ledger, re-polling"
                );
            } else {
                tracing::debug!(id = %id, "no matching transfer yet");
            }
            return Ok(false);
        }

        let lock = self.lock_for(id);
        let guard = lock.lock().await;
        let Some(mut record) = self.inner.records.get(id).await? else {
            return Ok(true);
        };
        if record.status.is_terminal() {
            return Ok(true);
        }

        let mut transitions = Vec::new();
        if record.status == TxStatus::Pending {
            record.transition_to(TxStatus::Confirmed)?;
            if record.receipt.is_none() {
                record.receipt = confirmation.receipt.clone();
            }
            transitions.push((TxStatus::Pending, record.clone()));
        }
        if record.status == TxStatus::Confirmed
            && confirmation.confirmations >= self.inner.config.finality_depth
        {
            record.transition_to(TxStatus::Finalized)?;
            transitions.push((TxStatus::Confirmed, record.clone()));
        }
        record.authoritative = true;
        self.inner.records.store(record.clone()).await?;
        for (previous, state) in &transitions {
            tracing::info!(id = %id, from = %previous, to = %state.status, "ledger poll transition");
            self.publish(state, Some(*previous));
        }
        drop(guard);
        Ok(record.status.is_terminal())
    }

    /// Moves a still-`Pending` record to `Expired`. Returns `true` when
    /// polling should stop (expired, already terminal, or gone).
    async fn expire_if_pending(&self, id: &TxId) -> Result<bool> {
        let lock = self.lock_for(id);
        let guard = lock.lock().await;
        let Some(mut record) = self.inner.records.get(id).await? else {
            return Ok(true);
        };
        if record.status.is_terminal() {
            return Ok(true);
        }
        if record.status != TxStatus::Pending {
            return Ok(false);
        }

        record.transition_to(TxStatus::Expired)?;
        self.inner.records.store(record.clone()).await?;
        tracing::info!(id = %id, "record expired without confirmation");
        self.publish(&record, Some(TxStatus::Pending));
        drop(guard);
        Ok(true)
    }

    fn publish(&self, record: &TransactionRecord, previous: Option<TxStatus>) {
        self.inner.hub.publish(&Self::event_for(record, previous));
    }

    fn event_for(record: &TransactionRecord, previous: Option<TxStatus>) -> StatusEvent {
        StatusEvent {
            tx_id: record.id.clone(),
            address: record.address.clone(),
            direction: record.direction,
            amount: record.amount,
            previous,
            status: record.status,
            receipt: record.receipt.clone(),
            at: Utc::now(),
        }
    }

    fn lock_for(&self, id: &TxId) -> Arc<RecordLock<()>> {
        let mut locks = self.inner.locks.lock().expect("lock table poisoned");
        locks.entry(id.clone()).or_default().clone()
    }
}
