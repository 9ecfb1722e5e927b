//! Order reuse decider.
//!
//! Decides, from what the Provider reported about an asset, the cheapest
//! action that yields a provider-verifiable order: reuse the existing order
//! paying only the provider fee, start a fresh order, or pay nothing at
//! all. This is what makes the common "immediately re-run a compute job"
//! case cost only a fee payment - or nothing - instead of a full
//! re-purchase of the asset.

use kelp_chain::{ProviderFee, TransactionId};
use kelp_provider::InitializeResult;

/// The action required to obtain a valid order for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    /// The prior order and its provider fee are both still valid; return
    /// the order unchanged, pay nothing.
    NoPaymentNeeded(TransactionId),
    /// The prior order is valid but the fee window lapsed; pay only the
    /// provider fee against the existing order.
    Reuse {
        /// The still-valid order to reference.
        order_tx: TransactionId,
        /// The fee that must be re-paid.
        fee: ProviderFee,
    },
    /// No valid prior order; pay the full asset price plus the fee (if
    /// any) in a single order transaction.
    FreshOrder {
        /// The fee to pay with the order, if one is required.
        fee: Option<ProviderFee>,
    },
}

/// Decide the cheapest action for the given initialization result.
///
/// Exactly three states are reachable. A present fee with zero amount is
/// normalized to "no fee required", so the decider never demands a payment
/// of nothing and never fails on a missing fee.
#[must_use]
pub fn decide_action(init: &InitializeResult) -> OrderAction {
    let fee = init.effective_fee();
    match (&init.valid_order, fee) {
        (Some(order_tx), None) => OrderAction::NoPaymentNeeded(order_tx.clone()),
        (Some(order_tx), Some(fee)) => OrderAction::Reuse {
            order_tx: order_tx.clone(),
            fee: fee.clone(),
        },
        (None, fee) => OrderAction::FreshOrder { fee: fee.cloned() },
    }
}
