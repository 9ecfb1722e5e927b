//! Initialization results returned by the Provider per asset.

use kelp_chain::{ProviderFee, TransactionId};
use serde::{Deserialize, Serialize};

/// What the Provider knows about an asset for a given consumer.
///
/// Invariants: if `provider_fee` is absent the previous order (if any)
/// remains fully valid and no payment is required; if `valid_order` is
/// absent a full order must be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// An existing order the Provider still considers valid.
    pub valid_order: Option<TransactionId>,
    /// A fee that must accompany the next order or reuse, if any.
    pub provider_fee: Option<ProviderFee>,
}

impl InitializeResult {
    /// The fee that actually requires payment.
    ///
    /// A present fee with zero amount is treated the same as an absent one.
    /// This is deliberate normalization: callers only ever see a fee here
    /// when something must be paid.
    #[must_use]
    pub fn effective_fee(&self) -> Option<&ProviderFee> {
        self.provider_fee.as_ref().filter(|f| !f.is_zero())
    }
}

/// Per-asset initialization results for a whole compute job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInitializeResult {
    /// One result per dataset, in request order.
    pub datasets: Vec<InitializeResult>,
    /// Result for the algorithm asset.
    pub algorithm: InitializeResult,
}
