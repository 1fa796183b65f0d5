use crate::domain::money::Amount;
use crate::domain::ports::{ConfirmationStatus, LedgerGateway, LedgerTransfer, Transfer};
use crate::domain::transaction::{Address, Direction, Receipt};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct SimState {
    confirmations: HashMap<(Address, Amount), ConfirmationStatus>,
    transfers: Vec<LedgerTransfer>,
    balances: HashMap<Address, Decimal>,
    unavailable: bool,
}

/// A scriptable in-process ledger used by tests and the demo binary.
///
/// Confirmation lookups are keyed by `(address, amount)`, matching the query
/// the tracker issues. Every `query_confirmation` call is counted so tests can
/// assert that polling stopped.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    state: Arc<RwLock<SimState>>,
    queries: Arc<AtomicU64>,
    submissions: Arc<AtomicU64>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for a pending `(address, amount)` confirmation query.
    pub async fn script_confirmation(
        &self,
        address: Address,
        amount: Amount,
        status: ConfirmationStatus,
    ) {
        let mut state = self.state.write().await;
        state.confirmations.insert((address, amount), status);
    }

    /// Adds a transfer to the simulated chain history.
    pub async fn push_transfer(&self, transfer: LedgerTransfer) {
        let mut state = self.state.write().await;
        state.transfers.push(transfer);
    }

    pub async fn set_balance(&self, address: Address, balance: Decimal) {
        let mut state = self.state.write().await;
        state.balances.insert(address, balance);
    }

    /// When set, every gateway call fails with `GatewayUnavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        let mut state = self.state.write().await;
        state.unavailable = unavailable;
    }

    /// Number of confirmation queries issued so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerGateway for SimulatedGateway {
    async fn submit(&self, transfer: Transfer) -> Result<Receipt> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(PaymentError::GatewayUnavailable(
                "simulated outage".to_string(),
            ));
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let receipt = Receipt::new(format!("sim-{n}"));
        state.transfers.push(LedgerTransfer {
            receipt: receipt.clone(),
            address: transfer.recipient,
            amount: transfer.amount,
            direction: Direction::Outgoing,
            timestamp: Utc::now(),
            memo: transfer.memo,
        });
        Ok(receipt)
    }

    async fn query_confirmation(
        &self,
        address: &Address,
        amount: Amount,
        _window_start: chrono::DateTime<Utc>,
    ) -> Result<ConfirmationStatus> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        if state.unavailable {
            return Err(PaymentError::GatewayUnavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(state
            .confirmations
            .get(&(address.clone(), amount))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_balance(&self, address: &Address) -> Result<Decimal> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(PaymentError::GatewayUnavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(state.balances.get(address).copied().unwrap_or(Decimal::ZERO))
    }

    async fn list_transfers(&self, address: &Address) -> Result<Vec<LedgerTransfer>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(PaymentError::GatewayUnavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(state
            .transfers
            .iter()
            .filter(|t| &t.address == address)
            .cloned()
            .collect())
    }
}
