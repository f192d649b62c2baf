use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletEntryKind {
    Debit,
    Credit,
}

/// Append-only wallet transaction record. The `reference` string is globally
/// unique and is the idempotency key for every financial operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: String,
    pub kind: WalletEntryKind,
    pub amount: i64,
    pub purpose: String,
    pub reference: String,
    pub related_order: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet not found for user: {0}")]
    NotFound(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Duplicate transaction reference: {0}")]
    DuplicateReference(String),

    #[error("Wallet storage error: {0}")]
    StorageError(String),
}

/// Contract for the internal wallet ledger.
///
/// Implementations must reject duplicate references at the storage layer
/// (the sole backstop against double-applied debits/credits) and serialize
/// balance mutation per user.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        purpose: &str,
        reference: &str,
        related_order: Option<&str>,
    ) -> Result<WalletTransaction, WalletError>;

    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        purpose: &str,
        reference: &str,
        related_order: Option<&str>,
    ) -> Result<WalletTransaction, WalletError>;

    async fn balance(&self, user_id: &str) -> Result<i64, WalletError>;
}
