//! Transaction types for chain operations.

use crate::wallet::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Transaction id (0x-prefixed 32-byte hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Create a new random transaction id.
    #[must_use]
    pub fn new() -> Self {
        let digest = Sha256::digest(Uuid::new_v4().as_bytes());
        Self(format!("0x{}", hex::encode(digest)))
    }

    /// Create from a string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Transaction is pending (not yet submitted).
    Pending,
    /// Transaction has been broadcast to the network.
    Submitted,
    /// Transaction confirmed on-chain.
    Confirmed,
    /// Transaction reverted or failed.
    Failed,
}

impl TransactionStatus {
    /// Check if the transaction is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Check if the transaction succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitted => write!(f, "submitted"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of chain transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// ERC20 approval for a spender.
    Approval,
    /// Datatoken order start.
    StartOrder,
    /// Reuse of an existing order (provider fee only).
    ReuseOrder,
    /// Atomic fixed-rate buy plus order.
    BuyFromFreAndOrder,
    /// Dispenser handout of datatokens.
    Dispense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approval => write!(f, "approval"),
            Self::StartOrder => write!(f, "start_order"),
            Self::ReuseOrder => write!(f, "reuse_order"),
            Self::BuyFromFreAndOrder => write!(f, "buy_from_fre_and_order"),
            Self::Dispense => write!(f, "dispense"),
        }
    }
}

/// A confirmed-or-failed chain transaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id (hash).
    pub id: TransactionId,

    /// Kind of transaction.
    pub kind: TransactionKind,

    /// Signer address.
    pub from: Address,

    /// Target contract address.
    pub contract: Address,

    /// Transaction status.
    pub status: TransactionStatus,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,

    /// Error message (if failed).
    pub error: Option<String>,

    /// Referenced order transaction (for reuse transactions).
    pub order_tx: Option<TransactionId>,
}

impl Transaction {
    /// Create a new pending transaction.
    #[must_use]
    pub fn new(kind: TransactionKind, from: Address, contract: Address) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            kind,
            from,
            contract,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
            order_tx: None,
        }
    }

    /// Attach a referenced order transaction id.
    #[must_use]
    pub fn with_order_tx(mut self, order_tx: TransactionId) -> Self {
        self.order_tx = Some(order_tx);
        self
    }

    /// Mark transaction as broadcast.
    pub fn mark_submitted(&mut self) {
        self.status = TransactionStatus::Submitted;
        self.updated_at = Utc::now();
    }

    /// Mark transaction as confirmed.
    pub fn mark_confirmed(&mut self) {
        self.status = TransactionStatus::Confirmed;
        self.updated_at = Utc::now();
    }

    /// Mark transaction as failed.
    pub fn mark_failed(&mut self, error: String) {
        self.status = TransactionStatus::Failed;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}
