//! Fee structures passed into datatoken order calls.

use crate::amount::Amount;
use crate::wallet::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signature over a provider fee, as supplied by the Provider service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSignature {
    /// Recovery id.
    pub v: u8,
    /// First signature half (0x hex).
    pub r: String,
    /// Second signature half (0x hex).
    pub s: String,
}

/// A per-request fee signed by the Provider service.
///
/// Paid on top of the asset price to cover service costs. Has its own
/// validity window, distinct from the order's validity (which the Provider
/// alone judges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFee {
    /// Address collecting the fee.
    pub address: Address,
    /// Token the fee is denominated in.
    pub token: Address,
    /// Fee amount.
    pub amount: Amount,
    /// Signature by the Provider over the fee fields.
    pub signature: FeeSignature,
    /// End of the fee's validity window.
    pub valid_until: DateTime<Utc>,
    /// Opaque data echoed back to the Provider at delivery time.
    pub provider_data: String,
}

impl ProviderFee {
    /// Check whether the fee's validity window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }

    /// Check whether the fee amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

/// An optional fee taken by the consuming market frontend.
///
/// Absence is modeled as `Option<ConsumeMarketFee>` rather than a
/// zero-address sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeMarketFee {
    /// Address collecting the fee.
    pub address: Address,
    /// Token the fee is denominated in.
    pub token: Address,
    /// Fee amount.
    pub amount: Amount,
}
