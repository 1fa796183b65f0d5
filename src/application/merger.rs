use crate::domain::ports::{LedgerGatewayRef, LedgerTransfer, TransactionStoreRef};
use crate::domain::transaction::{Address, Receipt, TransactionRecord, TxId, TxStatus};
use crate::error::Result;
use std::collections::HashMap;

/// The merged, de-duplicated history for an address.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedView {
    /// Most recent first; ties broken by id for a stable order.
    pub records: Vec<TransactionRecord>,
    /// True when the gateway could not be reached and only the local view is
    /// included.
    pub partial: bool,
}

/// Combines locally persisted records with the ledger's confirmed history for
/// an address into one de-duplicated, chronologically ordered view.
pub struct ReconciliationMerger {
    records: TransactionStoreRef,
    gateway: LedgerGatewayRef,
}

impl ReconciliationMerger {
    pub fn new(records: TransactionStoreRef, gateway: LedgerGatewayRef) -> Self {
        Self { records, gateway }
    }

    /// Merge rules: for a shared receipt the ledger-sourced copy wins (it is
    /// authoritative) but inherits the local record's id and richer
    /// description/category; receipt-less speculative records pass through;
    /// a gateway failure degrades to the local-only view flagged `partial`.
    ///
    /// Merging is idempotent: feeding the output back in changes nothing.
    pub async fn all_transactions(&self, address: &Address) -> Result<MergedView> {
        let local = self.records.all().await?;

        let ledger = match self.gateway.list_transfers(address).await {
            Ok(transfers) => transfers,
            Err(err) => {
                tracing::warn!(
                    address = %address,
                    error = %err,
                    "gateway unavailable, returning local-only view"
                );
                return Ok(MergedView {
                    records: sorted(local),
                    partial: true,
                });
            }
        };

        // Collapse local speculative duplicates first: one candidate per
        // receipt (the earliest), so a receipt can never appear twice.
        let mut by_receipt: HashMap<Receipt, TransactionRecord> = HashMap::new();
        let mut speculative = Vec::new();
        for record in local {
            match record.receipt.clone() {
                Some(receipt) => match by_receipt.get(&receipt) {
                    Some(existing) if keeps_priority(existing, &record) => {}
                    _ => {
                        by_receipt.insert(receipt, record);
                    }
                },
                None => speculative.push(record),
            }
        }

        let mut merged = Vec::new();
        for transfer in ledger {
            let mut record = record_from_transfer(&transfer);
            if let Some(local) = by_receipt.remove(&transfer.receipt) {
                record.id = local.id;
                if record.description.is_empty() {
                    record.description = local.description;
                }
                if record.category.is_none() {
                    record.category = local.category;
                }
            }
            merged.push(record);
        }

        // Local records the ledger does not (yet) report are retained as-is.
        merged.extend(by_receipt.into_values());
        merged.extend(speculative);

        Ok(MergedView {
            records: sorted(merged),
            partial: false,
        })
    }
}

/// Whether `existing` should survive a duplicate-receipt collision with
/// `candidate`: earliest creation wins, id as tie-break.
fn keeps_priority(existing: &TransactionRecord, candidate: &TransactionRecord) -> bool {
    (existing.created_at, &existing.id) <= (candidate.created_at, &candidate.id)
}

fn record_from_transfer(transfer: &LedgerTransfer) -> TransactionRecord {
    TransactionRecord {
        id: TxId::derived_from(&transfer.receipt),
        receipt: Some(transfer.receipt.clone()),
        address: transfer.address.clone(),
        amount: transfer.amount,
        direction: transfer.direction,
        status: TxStatus::Finalized,
        description: transfer.memo.clone().unwrap_or_default(),
        category: None,
        created_at: transfer.timestamp,
        confirmed_at: Some(transfer.timestamp),
        authoritative: true,
    }
}

/// Most recent first; equal timestamps fall back to id so the order is stable.
fn sorted(mut records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}
