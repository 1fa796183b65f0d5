use crate::domain::money::Amount;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ledger address (payer or payee side).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External identifier returned by the ledger on submission. Opaque to the
/// engine, only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally generated transaction record identifier. Never reused.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TxId(Uuid);

impl TxId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id for records observed only on the ledger: the same
    /// receipt always maps to the same id, so repeated reconciliations agree.
    pub fn derived_from(receipt: &Receipt) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, receipt.as_str().as_bytes()))
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Status of a tracked transaction.
///
/// `Pending` is initial. `Finalized`, `Failed` and `Expired` are terminal.
/// `Confirmed` either advances to `Finalized` or, when the ledger stops
/// reporting the transfer, is re-polled as an anomaly. It is never reverted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Finalized,
    Failed,
    Expired,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed | Self::Expired)
    }

    pub fn can_transition_to(self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Finalized)
                | (Self::Pending, Self::Failed)
                | (Self::Confirmed, Self::Failed)
                | (Self::Pending, Self::Expired)
        )
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// Caller-driven status change accepted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Accepted from `Pending` only; lands the record in `Confirmed`.
    Completed,
    /// Accepted from `Pending` or `Confirmed`.
    Failed,
}

/// The atomic unit of payment history.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub id: TxId,
    /// Present once the transfer was submitted to (or observed on) the ledger.
    pub receipt: Option<Receipt>,
    /// The ledger address this record is tracked against: the counterparty for
    /// outgoing transfers, the receiving address for incoming ones.
    pub address: Address,
    pub amount: Amount,
    pub direction: Direction,
    pub status: TxStatus,
    pub description: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// True once the record was observed directly from the ledger rather than
    /// only speculated locally.
    pub authoritative: bool,
}

impl TransactionRecord {
    pub fn new(
        address: Address,
        amount: Amount,
        direction: Direction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TxId::generate(),
            receipt: None,
            address,
            amount,
            direction,
            status: TxStatus::Pending,
            description: description.into(),
            category: None,
            created_at: Utc::now(),
            confirmed_at: None,
            authoritative: false,
        }
    }

    /// Applies a status transition, rejecting illegal ones and leaving the
    /// record untouched on error.
    pub fn transition_to(&mut self, next: TxStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == TxStatus::Confirmed {
            self.confirmed_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> TransactionRecord {
        TransactionRecord::new(
            Address::new("V1"),
            Amount::new(dec!(0.5)).unwrap(),
            Direction::Incoming,
            "coffee",
        )
    }

    #[test]
    fn test_legal_transition_chain() {
        let mut rec = record();
        rec.transition_to(TxStatus::Confirmed).unwrap();
        assert!(rec.confirmed_at.is_some());
        rec.transition_to(TxStatus::Finalized).unwrap();
        assert!(rec.status.is_terminal());
    }

    #[test]
    fn test_illegal_transition_leaves_record_unchanged() {
        let mut rec = record();
        rec.transition_to(TxStatus::Confirmed).unwrap();
        let before = rec.clone();

        let err = rec.transition_to(TxStatus::Pending).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PaymentError::InvalidTransition { .. }
        ));
        assert_eq!(rec, before);
    }

    #[test]
    fn test_failed_reachable_from_pending_and_confirmed() {
        let mut rec = record();
        assert!(rec.status.can_transition_to(TxStatus::Failed));
        rec.transition_to(TxStatus::Confirmed).unwrap();
        assert!(rec.status.can_transition_to(TxStatus::Failed));
        rec.transition_to(TxStatus::Finalized).unwrap();
        assert!(!rec.status.can_transition_to(TxStatus::Failed));
    }

    #[test]
    fn test_expired_only_from_pending() {
        let mut rec = record();
        assert!(rec.status.can_transition_to(TxStatus::Expired));
        rec.transition_to(TxStatus::Confirmed).unwrap();
        assert!(!rec.status.can_transition_to(TxStatus::Expired));
    }

    #[test]
    fn test_derived_ids_are_stable_per_receipt() {
        let receipt = Receipt::new("sig-abc");
        assert_eq!(TxId::derived_from(&receipt), TxId::derived_from(&receipt));
        assert_ne!(
            TxId::derived_from(&receipt),
            TxId::derived_from(&Receipt::new("sig-def"))
        );
    }

    #[test]
    fn test_timestamps_roundtrip_as_iso8601() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        // ISO-8601 timestamps and string-encoded decimal amounts.
        assert!(json.contains("\"amount\":\"0.5\""));
        let back: TransactionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
