//! Error types for Provider operations.

use thiserror::Error;

/// Result type alias for Provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur talking to the Provider service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request to the Provider failed.
    #[error("provider request failed: {message}")]
    RequestFailed {
        /// Description of the failure.
        message: String,
    },

    /// Unknown compute environment.
    #[error("compute environment not found: {id}")]
    EnvironmentNotFound {
        /// Environment id.
        id: String,
    },

    /// An order transaction submitted for job start has no matching order.
    #[error("no order found for transaction {tx_id}")]
    OrderNotFound {
        /// Order transaction id.
        tx_id: String,
    },

    /// Environment job ceiling reached for this consumer.
    #[error("job limit reached for environment {environment}: max {max_jobs}")]
    JobLimitReached {
        /// Environment id.
        environment: String,
        /// Maximum concurrent jobs allowed.
        max_jobs: u32,
    },

    /// Requested job duration exceeds the environment ceiling.
    #[error("requested duration {requested_secs}s exceeds environment maximum {max_secs}s")]
    DurationExceeded {
        /// Requested duration in seconds.
        requested_secs: u64,
        /// Environment maximum in seconds.
        max_secs: u64,
    },

    /// Chain lookup failed while building a response.
    #[error("chain error: {0}")]
    Chain(#[from] kelp_chain::ChainError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Create a request failure error.
    #[must_use]
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            message: message.into(),
        }
    }
}
