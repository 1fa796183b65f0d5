use crate::domain::money::Amount;
use crate::domain::transaction::{Address, TxId};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IntentId(Uuid);

impl IntentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Active` is the only non-terminal state; everything else is immutable.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Active,
    Completed,
    Expired,
    Cancelled,
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// A short-lived request for a specific amount to a specific recipient.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub payee: Address,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: IntentStatus,
    /// The record that fulfilled this intent, linked 1:1 on completion.
    pub tx_id: Option<TxId>,
}

impl PaymentIntent {
    pub fn new(
        payee: Address,
        amount: Amount,
        description: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: IntentId::generate(),
            payee,
            amount,
            description: description.into(),
            created_at,
            expires_at: created_at + ttl,
            status: IntentStatus::Active,
            tx_id: None,
        }
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == IntentStatus::Active && now >= self.expires_at
    }

    /// Checks that the intent can leave `Active`. Expired intents report
    /// `ExpiredIntent`, other terminal states `InvalidTransition`.
    pub fn ensure_active(&self, target: IntentStatus) -> Result<()> {
        match self.status {
            IntentStatus::Active => Ok(()),
            IntentStatus::Expired => Err(PaymentError::ExpiredIntent {
                id: self.id.to_string(),
                expired_at: self.expires_at,
            }),
            from => Err(PaymentError::InvalidTransition {
                id: self.id.to_string(),
                from: from.to_string(),
                to: target.to_string(),
            }),
        }
    }
}
