use crate::domain::intent::{IntentId, PaymentIntent};
use crate::domain::money::Amount;
use crate::domain::order::{NotificationId, Order, OrderId, OrderNotification};
use crate::domain::transaction::{Address, Direction, Receipt, TransactionRecord, TxId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A transfer to be submitted to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub recipient: Address,
    pub amount: Amount,
    pub memo: Option<String>,
}

/// What the ledger currently reports for an expected transfer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfirmationStatus {
    pub found: bool,
    pub receipt: Option<Receipt>,
    pub confirmations: u64,
    pub block_height: Option<u64>,
}

/// A transfer as observed on the ledger itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerTransfer {
    pub receipt: Receipt,
    pub address: Address,
    pub amount: Amount,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub memo: Option<String>,
}

/// The narrow interface to the external ledger. Single source of truth,
/// never mutated by this engine beyond `submit`.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit(&self, transfer: Transfer) -> Result<Receipt>;

    /// Queries whether a transfer matching `address`/`amount`, created at or
    /// after `window_start`, has landed on the ledger.
    async fn query_confirmation(
        &self,
        address: &Address,
        amount: Amount,
        window_start: DateTime<Utc>,
    ) -> Result<ConfirmationStatus>;

    async fn get_balance(&self, address: &Address) -> Result<Decimal>;

    /// Bulk fetch of ledger-confirmed transfers for an address, used by the
    /// reconciliation merger.
    async fn list_transfers(&self, address: &Address) -> Result<Vec<LedgerTransfer>>;
}

pub type LedgerGatewayRef = Arc<dyn LedgerGateway>;

#[async_trait]
pub trait TransactionRecordStore: Send + Sync {
    async fn store(&self, record: TransactionRecord) -> Result<()>;
    async fn get(&self, id: &TxId) -> Result<Option<TransactionRecord>>;
    async fn get_by_receipt(&self, receipt: &Receipt) -> Result<Option<TransactionRecord>>;
    async fn all(&self) -> Result<Vec<TransactionRecord>>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub type TransactionStoreRef = Arc<dyn TransactionRecordStore>;

#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn store(&self, intent: PaymentIntent) -> Result<()>;
    async fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>>;
    async fn all(&self) -> Result<Vec<PaymentIntent>>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub type IntentStoreRef = Arc<dyn IntentStore>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;
    async fn for_payee(&self, payee: &Address) -> Result<Vec<Order>>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub type OrderStoreRef = Arc<dyn OrderStore>;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn append(&self, notification: OrderNotification) -> Result<()>;
    async fn for_payee(&self, payee: &Address) -> Result<Vec<OrderNotification>>;
    async fn mark_read(&self, id: &NotificationId) -> Result<()>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub type NotificationStoreRef = Arc<dyn NotificationStore>;
