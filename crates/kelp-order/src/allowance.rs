//! Fee/allowance gate.
//!
//! Ensures a spender contract can pull a payment before the payment-bearing
//! call is submitted. Idempotent: an approval transaction is issued only
//! when the existing allowance is insufficient.

use crate::error::{OrderError, Result};
use kelp_chain::{Address, Amount, ChainClient, Transaction, Wallet};
use tracing::debug;

/// Outcome of an allowance check.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    /// Existing allowance already covers the required amount; no
    /// transaction was issued.
    Sufficient,
    /// An approval transaction was submitted and confirmed.
    Approved(Transaction),
}

impl ApprovalOutcome {
    /// Whether an approval transaction was issued.
    #[must_use]
    pub const fn approved(&self) -> bool {
        matches!(self, Self::Approved(_))
    }
}

/// Ensure `spender` may pull at least `required` of the signer's `token`.
///
/// Reads the current allowance for `(signer, spender, token)`. If it
/// already covers `required` - regardless of how it got there - nothing is
/// submitted. Otherwise an approval for exactly `required` is submitted
/// (or an unlimited approval when `unlimited` is set, for markets that
/// expect repeated spends). The allowance is never decreased here.
///
/// Exactly 0 or 1 on-chain transactions per call.
///
/// # Errors
///
/// Returns [`OrderError::Allowance`] if the approval transaction fails;
/// the failure is surfaced, never retried.
pub async fn ensure_allowance(
    chain: &ChainClient,
    signer: &Wallet,
    token: &Address,
    spender: &Address,
    required: Amount,
    unlimited: bool,
) -> Result<ApprovalOutcome> {
    let current = chain.allowance(token, signer.address(), spender).await?;
    if current >= required {
        debug!(
            token = %token,
            spender = %spender,
            current = %current,
            required = %required,
            "allowance sufficient"
        );
        return Ok(ApprovalOutcome::Sufficient);
    }

    let amount = if unlimited { Amount::MAX } else { required };
    let tx = chain
        .approve(signer, token, spender, amount)
        .await
        .map_err(|e| OrderError::allowance(e.to_string()))?;
    Ok(ApprovalOutcome::Approved(tx))
}
