//! Pricing resolver.
//!
//! Classifies how an asset's datatoken can be acquired by inspecting the
//! on-chain registries. Read-only; the classification is recomputed per
//! acquisition attempt and never cached (registries can change between
//! lookups, though this is rare in practice).

use crate::error::Result;
use kelp_chain::{Address, Amount, ChainClient};
use serde::{Deserialize, Serialize};

/// Parameters of a fixed-rate acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedRateParams {
    /// Exchange id within the fixed-rate contract.
    pub exchange_id: String,
    /// Fixed-rate contract address (the base-token spender).
    pub contract: Address,
    /// Base token the price is denominated in.
    pub base_token: Address,
    /// Constant price for one datatoken.
    pub price: Amount,
}

/// Parameters of a free (dispenser) acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserParams {
    /// Dispenser contract address.
    pub contract: Address,
}

/// The acquisition mechanism governing a datatoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingSchema {
    /// Direct fixed-price exchange against a base token.
    Fixed(FixedRateParams),
    /// Free dispenser handout.
    Free(DispenserParams),
    /// No registered mechanism; the asset is not purchasable. A legitimate
    /// terminal classification, not an error - callers must check for it
    /// before attempting acquisition.
    NotAllowed,
}

impl PricingSchema {
    /// Whether no acquisition mechanism is registered.
    #[must_use]
    pub const fn is_not_allowed(&self) -> bool {
        matches!(self, Self::NotAllowed)
    }
}

/// Classify the acquisition mechanism for a datatoken.
///
/// The fixed-rate registry is queried first and short-circuits: when both
/// a fixed-rate exchange and a dispenser are registered, `Fixed` wins.
///
/// # Errors
///
/// Returns error if a registry lookup fails.
pub async fn classify_pricing(chain: &ChainClient, datatoken: &Address) -> Result<PricingSchema> {
    if let Some(exchange) = chain.fixed_rate_for(datatoken).await? {
        return Ok(PricingSchema::Fixed(FixedRateParams {
            exchange_id: exchange.exchange_id,
            contract: exchange.contract,
            base_token: exchange.base_token,
            price: exchange.price,
        }));
    }
    if let Some(dispenser) = chain.dispenser_for(datatoken).await? {
        return Ok(PricingSchema::Free(DispenserParams {
            contract: dispenser.contract,
        }));
    }
    Ok(PricingSchema::NotAllowed)
}
