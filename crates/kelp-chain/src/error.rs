//! Error types for chain operations.

use thiserror::Error;

/// Result type alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Invalid account or contract address format.
    #[error("invalid address: {message}")]
    InvalidAddress {
        /// Description of the address error.
        message: String,
    },

    /// Insufficient token balance for operation.
    #[error("insufficient balance of {token}: have {have}, need {need}")]
    InsufficientBalance {
        /// Token contract address.
        token: String,
        /// Current balance in tokens.
        have: String,
        /// Required balance in tokens.
        need: String,
    },

    /// Spender allowance too low for a token pull.
    #[error("insufficient allowance for {spender}: have {have}, need {need}")]
    InsufficientAllowance {
        /// Spender contract address.
        spender: String,
        /// Approved amount in tokens.
        have: String,
        /// Required amount in tokens.
        need: String,
    },

    /// Contract call reverted.
    #[error("reverted: {reason}")]
    Reverted {
        /// Revert reason from the contract.
        reason: String,
    },

    /// Transaction failed before confirmation.
    #[error("transaction failed: {reason}")]
    TransactionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Transaction not found.
    #[error("transaction not found: {id}")]
    TransactionNotFound {
        /// Transaction id.
        id: String,
    },

    /// Order not found for a transaction id.
    #[error("order not found: {tx_id}")]
    OrderNotFound {
        /// Order transaction id.
        tx_id: String,
    },

    /// No fixed-rate exchange registered under the given id.
    #[error("exchange not found: {exchange_id}")]
    ExchangeNotFound {
        /// Exchange id.
        exchange_id: String,
    },

    /// Network error.
    #[error("network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid amount.
    #[error("invalid amount: {message}")]
    InvalidAmount {
        /// Description of the amount error.
        message: String,
    },

    /// Wallet error.
    #[error("wallet error: {message}")]
    WalletError {
        /// Description of the wallet error.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChainError {
    /// Create an invalid address error.
    #[must_use]
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Create a revert error with the given reason.
    #[must_use]
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create an invalid amount error.
    #[must_use]
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    /// Create a wallet error.
    #[must_use]
    pub fn wallet_error(message: impl Into<String>) -> Self {
        Self::WalletError {
            message: message.into(),
        }
    }
}
