use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("unknown id: {0}")]
    NotFound(String),

    #[error("transition not permitted for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("ledger gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("persisted data unreadable in namespace '{namespace}': {reason}")]
    PersistenceCorrupt { namespace: String, reason: String },

    #[error("payment intent {id} expired at {expired_at}")]
    ExpiredIntent {
        id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
