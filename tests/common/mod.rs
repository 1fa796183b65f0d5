#![allow(dead_code)]

use payflow::application::hub::NotificationHub;
use payflow::application::tracker::{PollConfig, StatusTracker};
use payflow::domain::money::Amount;
use payflow::domain::ports::{ConfirmationStatus, TransactionStoreRef};
use payflow::domain::transaction::Receipt;
use payflow::infrastructure::in_memory::InMemoryTransactionStore;
use payflow::infrastructure::simulated::SimulatedGateway;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Tight polling so tests settle in a few hundred milliseconds.
pub fn fast_config() -> PollConfig {
    PollConfig {
        initial_delay: Duration::from_millis(20),
        interval: Duration::from_millis(20),
        finality_depth: 1,
    }
}

pub fn amount(value: &str) -> Amount {
    Amount::new(value.parse::<Decimal>().unwrap()).unwrap()
}

pub fn confirmed(receipt: &str, confirmations: u64) -> ConfirmationStatus {
    ConfirmationStatus {
        found: true,
        receipt: Some(Receipt::new(receipt)),
        confirmations,
        block_height: Some(1),
    }
}

pub fn tracker_setup(
    config: PollConfig,
) -> (
    StatusTracker,
    SimulatedGateway,
    TransactionStoreRef,
    Arc<NotificationHub>,
) {
    let gateway = SimulatedGateway::new();
    let records: TransactionStoreRef = Arc::new(InMemoryTransactionStore::new());
    let hub = Arc::new(NotificationHub::new());
    let tracker = StatusTracker::new(
        Arc::clone(&records),
        Arc::new(gateway.clone()),
        Arc::clone(&hub),
        config,
    );
    (tracker, gateway, records, hub)
}

/// Generous settle time for polling-driven assertions.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}
