use crate::domain::intent::{IntentId, IntentStatus, PaymentIntent};
use crate::domain::money::Amount;
use crate::domain::ports::{IntentStoreRef, TransactionStoreRef};
use crate::domain::transaction::{
    Address, Direction, Receipt, TransactionRecord, TxId, TxStatus,
};
use crate::error::{PaymentError, Result};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as IntentLock;

/// Payee-side lifecycle of payment intents: creation with a fixed ttl, lazy
/// expiry sweeping on every read, completion (which links the fulfilling
/// transaction record) and cancellation. Once an intent leaves `Active` it
/// never changes again, so every read-modify-write is serialized per id.
pub struct IntentService {
    intents: IntentStoreRef,
    records: TransactionStoreRef,
    ttl: Duration,
    /// One exclusive critical section per intent id, held across
    /// read, validation and store.
    locks: Mutex<HashMap<IntentId, Arc<IntentLock<()>>>>,
}

impl IntentService {
    pub const DEFAULT_TTL_MINUTES: i64 = 15;

    pub fn new(intents: IntentStoreRef, records: TransactionStoreRef) -> Self {
        Self::with_ttl(intents, records, Duration::minutes(Self::DEFAULT_TTL_MINUTES))
    }

    pub fn with_ttl(intents: IntentStoreRef, records: TransactionStoreRef, ttl: Duration) -> Self {
        Self {
            intents,
            records,
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(
        &self,
        payee: Address,
        amount: Amount,
        description: impl Into<String>,
    ) -> Result<PaymentIntent> {
        let intent = PaymentIntent::new(payee, amount, description, self.ttl);
        self.intents.store(intent.clone()).await?;
        tracing::info!(id = %intent.id, expires_at = %intent.expires_at, "payment intent created");
        Ok(intent)
    }

    /// Fetches one intent, sweeping it to `Expired` first if its ttl passed
    /// while still `Active`.
    pub async fn get(&self, id: &IntentId) -> Result<PaymentIntent> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.load_swept(id).await
    }

    /// All intents, swept.
    pub async fn all(&self) -> Result<Vec<PaymentIntent>> {
        let mut swept = Vec::new();
        for intent in self.intents.all().await? {
            let lock = self.lock_for(&intent.id);
            let _guard = lock.lock().await;
            swept.push(self.load_swept(&intent.id).await?);
        }
        Ok(swept)
    }

    pub async fn active(&self) -> Result<Vec<PaymentIntent>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|intent| intent.status == IntentStatus::Active)
            .collect())
    }

    pub async fn completed(&self) -> Result<Vec<PaymentIntent>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|intent| intent.status == IntentStatus::Completed)
            .collect())
    }

    /// Sum of completed amounts, in exact decimal arithmetic.
    pub async fn total_completed(&self) -> Result<Decimal> {
        Ok(self
            .completed()
            .await?
            .iter()
            .map(|intent| intent.amount.value())
            .sum())
    }

    /// Completes an `Active` intent, creating the finalized, authoritative
    /// transaction record it is linked 1:1 with.
    pub async fn complete(&self, id: &IntentId, receipt: Receipt) -> Result<PaymentIntent> {
        self.complete_linked(id, receipt, None).await
    }

    /// Like [`IntentService::complete`], but linking an existing record
    /// (created when the intent was put under watch) instead of a new one.
    /// The record is promoted to `Finalized` if it is not there yet.
    pub async fn complete_linked(
        &self,
        id: &IntentId,
        receipt: Receipt,
        tx_id: Option<TxId>,
    ) -> Result<PaymentIntent> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut intent = self.load_swept(id).await?;
        intent.ensure_active(IntentStatus::Completed)?;

        let record_id = match tx_id {
            Some(tx_id) => {
                let mut record = self
                    .records
                    .get(&tx_id)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(tx_id.to_string()))?;
                if record.status == TxStatus::Pending {
                    record.transition_to(TxStatus::Confirmed)?;
                }
                if record.status == TxStatus::Confirmed {
                    record.transition_to(TxStatus::Finalized)?;
                }
                record.receipt = Some(receipt);
                record.authoritative = true;
                self.records.store(record).await?;
                tx_id
            }
            None => {
                let mut record = TransactionRecord::new(
                    intent.payee.clone(),
                    intent.amount,
                    Direction::Incoming,
                    intent.description.clone(),
                );
                record.transition_to(TxStatus::Confirmed)?;
                record.transition_to(TxStatus::Finalized)?;
                record.receipt = Some(receipt);
                record.authoritative = true;
                let record_id = record.id.clone();
                self.records.store(record).await?;
                record_id
            }
        };

        intent.status = IntentStatus::Completed;
        intent.tx_id = Some(record_id);
        self.intents.store(intent.clone()).await?;
        tracing::info!(id = %intent.id, tx = ?intent.tx_id, "payment intent completed");
        Ok(intent)
    }

    /// Explicit withdrawal; only valid from `Active`.
    pub async fn cancel(&self, id: &IntentId) -> Result<PaymentIntent> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut intent = self.load_swept(id).await?;
        intent.ensure_active(IntentStatus::Cancelled)?;
        intent.status = IntentStatus::Cancelled;
        self.intents.store(intent.clone()).await?;
        tracing::info!(id = %intent.id, "payment intent cancelled");
        Ok(intent)
    }

    async fn sweep_one(&self, mut intent: PaymentIntent) -> Result<PaymentIntent> {
        if intent.is_due_for_expiry(Utc::now()) {
            intent.status = IntentStatus::Expired;
            self.intents.store(intent.clone()).await?;
            tracing::info!(id = %intent.id, "payment intent expired");
        }
        Ok(intent)
    }

    /// Fresh read plus lazy expiry sweep. The caller holds the intent's lock.
    async fn load_swept(&self, id: &IntentId) -> Result<PaymentIntent> {
        let intent = self
            .intents
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        self.sweep_one(intent).await
    }

    fn lock_for(&self, id: &IntentId) -> Arc<IntentLock<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks.entry(id.clone()).or_default().clone()
    }
}
