//! Error types for order resolution and compute-job orchestration.

use kelp_chain::TransactionId;
use thiserror::Error;

/// Result type alias for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Order transactions obtained before a compute job failed partway.
///
/// Already-placed orders remain valid, so a caller holding this can re-run
/// the whole job cheaply: the reuse logic will skip every asset listed
/// here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquiredOrders {
    /// The algorithm order, if it was acquired before the failure.
    pub algorithm_tx_id: Option<TransactionId>,
    /// Dataset orders acquired before the failure, in request order.
    pub dataset_tx_ids: Vec<TransactionId>,
}

impl AcquiredOrders {
    /// Total number of orders acquired.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.algorithm_tx_id.is_some()) + self.dataset_tx_ids.len()
    }

    /// Whether nothing was acquired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.algorithm_tx_id.is_none() && self.dataset_tx_ids.is_empty()
    }
}

/// Errors that can occur while acquiring consumption rights.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Approval transaction reverted or the signer is underfunded.
    #[error("allowance error: {reason}")]
    Allowance {
        /// Reason the approval failed.
        reason: String,
    },

    /// The asset has neither a fixed-rate exchange nor a dispenser
    /// registered; it is not purchasable.
    #[error("no acquisition mechanism registered for datatoken {datatoken}")]
    NoAcquisitionMechanism {
        /// Datatoken address.
        datatoken: String,
    },

    /// A stale provider fee was rejected on-chain; re-run initialization
    /// to obtain a fresh fee and retry.
    #[error("provider fee expired for datatoken {datatoken}")]
    ProviderFeeExpired {
        /// Datatoken address.
        datatoken: String,
    },

    /// An order placement reverted on-chain.
    #[error("order reverted: {reason}")]
    OrderRevert {
        /// Raw revert reason for diagnostics.
        reason: String,
    },

    /// A compute job failed after some assets were already acquired.
    #[error("compute job failed at {asset} after {} acquisitions: {source}", acquired.len())]
    PartialComputeJob {
        /// The asset whose acquisition failed.
        asset: String,
        /// Orders obtained before the failure.
        acquired: AcquiredOrders,
        /// The underlying acquisition error.
        #[source]
        source: Box<OrderError>,
    },

    /// Provider request failed.
    #[error("provider error: {0}")]
    Provider(#[from] kelp_provider::ProviderError),

    /// Chain read or unclassified chain failure.
    #[error("chain error: {0}")]
    Chain(#[from] kelp_chain::ChainError),
}

impl OrderError {
    /// Create an allowance error.
    #[must_use]
    pub fn allowance(reason: impl Into<String>) -> Self {
        Self::Allowance {
            reason: reason.into(),
        }
    }

    /// Create an order revert error.
    #[must_use]
    pub fn order_revert(reason: impl Into<String>) -> Self {
        Self::OrderRevert {
            reason: reason.into(),
        }
    }
}
