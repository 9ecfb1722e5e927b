//! Single-asset acquisition.
//!
//! Drives one asset from "no rights" to a valid, provider-verifiable order
//! reference in the fewest possible on-chain transactions, composing the
//! pricing resolver and reuse decider with the allowance gate.

use crate::allowance::ensure_allowance;
use crate::error::{OrderError, Result};
use crate::pricing::{classify_pricing, PricingSchema};
use crate::reuse::{decide_action, OrderAction};
use chrono::{DateTime, Utc};
use kelp_chain::{
    Amount, ChainClient, ChainError, TransactionId, Wallet, FEE_EXPIRED_REASON,
};
use kelp_provider::{AssetRef, InitializeResult, ProviderClient};
use std::sync::Arc;
use tracing::{debug, info};

/// Order resolution service.
///
/// Composes the chain and Provider clients into the asset-acquisition and
/// compute-job flows. No retries happen inside: every failure is surfaced
/// to the caller with enough context to retry, abort, or top up funds.
pub struct OrderService {
    chain: Arc<ChainClient>,
    provider: Arc<ProviderClient>,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(chain: Arc<ChainClient>, provider: Arc<ProviderClient>) -> Self {
        Self { chain, provider }
    }

    /// Get the underlying chain client.
    #[must_use]
    pub fn chain(&self) -> &ChainClient {
        &self.chain
    }

    /// Get the underlying Provider client.
    #[must_use]
    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    /// Acquire consumption rights for one asset.
    ///
    /// Applies the reuse decider to the Provider's initialization result
    /// and submits the minimal set of transactions: nothing if the prior
    /// order and fee are valid, a fee-only reuse if only the fee lapsed, or
    /// a fresh order through whichever pricing mechanism the resolver
    /// finds. All submissions are awaited to confirmation; the returned
    /// transaction id is usable once this returns.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoAcquisitionMechanism`] for assets with no
    /// registered pricing, [`OrderError::ProviderFeeExpired`] when the
    /// chain rejects a stale fee, and [`OrderError::OrderRevert`] for any
    /// other revert, with the raw reason attached.
    pub async fn acquire(
        &self,
        asset: &AssetRef,
        init: &InitializeResult,
        payer: &Wallet,
    ) -> Result<TransactionId> {
        // The datatoken contract is the spender that pulls the provider
        // fee at settlement time.
        if let Some(fee) = init.effective_fee() {
            ensure_allowance(&self.chain, payer, &fee.token, &asset.datatoken, fee.amount, false)
                .await?;
        }

        match decide_action(init) {
            OrderAction::NoPaymentNeeded(order_tx) => {
                debug!(asset = %asset, order = %order_tx, "existing order still valid");
                Ok(order_tx)
            }
            OrderAction::Reuse { order_tx, fee } => {
                let tx = self
                    .chain
                    .reuse_order(payer, &asset.datatoken, &order_tx, Some(&fee))
                    .await
                    .map_err(|e| submit_error(asset, e))?;
                info!(asset = %asset, order = %order_tx, tx = %tx.id, "order reused");
                Ok(tx.id)
            }
            OrderAction::FreshOrder { fee } => self.fresh_order(asset, fee.as_ref(), payer).await,
        }
    }

    /// Initialize and acquire in one step (the single-asset download flow).
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::acquire`], plus Provider errors
    /// from initialization.
    pub async fn order_asset(
        &self,
        asset: &AssetRef,
        payer: &Wallet,
        valid_until: DateTime<Utc>,
    ) -> Result<TransactionId> {
        let init = self
            .provider
            .initialize(asset, payer.address(), valid_until)
            .await?;
        self.acquire(asset, &init, payer).await
    }

    async fn fresh_order(
        &self,
        asset: &AssetRef,
        fee: Option<&kelp_chain::ProviderFee>,
        payer: &Wallet,
    ) -> Result<TransactionId> {
        match classify_pricing(&self.chain, &asset.datatoken).await? {
            PricingSchema::Fixed(params) => {
                ensure_allowance(
                    &self.chain,
                    payer,
                    &params.base_token,
                    &params.contract,
                    params.price,
                    false,
                )
                .await?;
                let tx = self
                    .chain
                    .buy_from_fre_and_order(
                        payer,
                        &asset.datatoken,
                        &params.exchange_id,
                        params.price,
                        payer.address(),
                        asset.service_index,
                        fee,
                        None,
                    )
                    .await
                    .map_err(|e| submit_error(asset, e))?;
                info!(asset = %asset, tx = %tx.id, price = %params.price, "fixed-rate order placed");
                Ok(tx.id)
            }
            PricingSchema::Free(_) => {
                self.chain
                    .dispense(payer, &asset.datatoken, Amount::tokens(1.0))
                    .await
                    .map_err(|e| submit_error(asset, e))?;
                let tx = self
                    .chain
                    .start_order(
                        payer,
                        &asset.datatoken,
                        payer.address(),
                        asset.service_index,
                        fee,
                        None,
                    )
                    .await
                    .map_err(|e| submit_error(asset, e))?;
                info!(asset = %asset, tx = %tx.id, "free order placed");
                Ok(tx.id)
            }
            PricingSchema::NotAllowed => Err(OrderError::NoAcquisitionMechanism {
                datatoken: asset.datatoken.to_string(),
            }),
        }
    }
}

/// Map a failed order submission to its typed error.
fn submit_error(asset: &AssetRef, e: ChainError) -> OrderError {
    match e {
        ChainError::Reverted { ref reason } if reason.contains(FEE_EXPIRED_REASON) => {
            OrderError::ProviderFeeExpired {
                datatoken: asset.datatoken.to_string(),
            }
        }
        ChainError::Reverted { reason } => OrderError::order_revert(reason),
        ChainError::InsufficientBalance { .. } | ChainError::InsufficientAllowance { .. } => {
            OrderError::order_revert(e.to_string())
        }
        other => OrderError::Chain(other),
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kelp_chain::Address;

    fn addr() -> Address {
        Wallet::generate().expect("wallet").address().clone()
    }

    fn service() -> (Arc<ChainClient>, Arc<ProviderClient>, OrderService) {
        let chain = Arc::new(ChainClient::testnet());
        let provider = Arc::new(ProviderClient::simulated(Arc::clone(&chain)).expect("provider"));
        let service = OrderService::new(Arc::clone(&chain), Arc::clone(&provider));
        (chain, provider, service)
    }

    fn in_half_an_hour() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(30)
    }

    #[tokio::test]
    async fn test_fixed_pricing_fresh_order() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let dai = addr();

        chain
            .register_fixed_rate(&asset.datatoken, &dai, Amount::tokens(10.0))
            .await
            .expect("register");
        chain
            .mint(&dai, payer.address(), Amount::tokens(50.0))
            .await
            .expect("mint");

        let tx_id = service
            .order_asset(&asset, &payer, in_half_an_hour())
            .await
            .expect("order");

        // One approval for the price against the exchange, one atomic
        // buy-and-order.
        let txs = chain.transactions_from(payer.address()).await;
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].kind, kelp_chain::TransactionKind::Approval);
        assert_eq!(txs[1].kind, kelp_chain::TransactionKind::BuyFromFreAndOrder);
        assert_eq!(txs[1].id, tx_id);

        let balance = chain.balance(&dai, payer.address()).await.expect("balance");
        assert_eq!(balance, Amount::tokens(40.0));
    }

    #[tokio::test]
    async fn test_free_pricing_with_provider_fee() {
        let (chain, provider, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let usdc = addr();

        chain
            .register_dispenser(&asset.datatoken, Amount::tokens(1.0))
            .await
            .expect("register");
        provider
            .set_fee_policy(&asset.document_id, usdc.clone(), Amount::tokens(2.0))
            .await;
        chain
            .mint(&usdc, payer.address(), Amount::tokens(10.0))
            .await
            .expect("mint");

        service
            .order_asset(&asset, &payer, in_half_an_hour())
            .await
            .expect("order");

        // Fee approval against the datatoken, dispense, then the order
        // paying only the provider fee.
        let txs = chain.transactions_from(payer.address()).await;
        let kinds: Vec<_> = txs.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                kelp_chain::TransactionKind::Approval,
                kelp_chain::TransactionKind::Dispense,
                kelp_chain::TransactionKind::StartOrder,
            ]
        );

        let balance = chain.balance(&usdc, payer.address()).await.expect("balance");
        assert_eq!(balance, Amount::tokens(8.0));
    }

    #[tokio::test]
    async fn test_no_mechanism_fails() {
        let (_, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());

        let result = service.order_asset(&asset, &payer, in_half_an_hour()).await;
        assert!(matches!(
            result,
            Err(OrderError::NoAcquisitionMechanism { .. })
        ));
    }

    #[tokio::test]
    async fn test_valid_order_short_circuits() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());

        let init = InitializeResult {
            valid_order: Some(TransactionId::from_string("0xabc")),
            provider_fee: None,
        };
        let tx_id = service.acquire(&asset, &init, &payer).await.expect("acquire");
        assert_eq!(tx_id.as_str(), "0xabc");
        assert_eq!(chain.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_reuse_pays_only_fee() {
        let (chain, provider, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let dai = addr();
        let usdc = addr();

        chain
            .register_fixed_rate(&asset.datatoken, &dai, Amount::tokens(10.0))
            .await
            .expect("register");
        chain
            .mint(&dai, payer.address(), Amount::tokens(10.0))
            .await
            .expect("mint dai");
        chain
            .mint(&usdc, payer.address(), Amount::tokens(10.0))
            .await
            .expect("mint usdc");

        // Full purchase first.
        let order_tx = service
            .order_asset(&asset, &payer, in_half_an_hour())
            .await
            .expect("order");
        assert_eq!(
            chain.balance(&dai, payer.address()).await.expect("balance"),
            Amount::ZERO
        );

        // Fee window lapsed: the Provider now demands a fresh fee with the
        // existing order. The price must not be paid again.
        provider
            .set_fee_policy(&asset.document_id, usdc.clone(), Amount::tokens(2.0))
            .await;
        let reuse_tx = service
            .order_asset(&asset, &payer, in_half_an_hour())
            .await
            .expect("reuse");
        assert_ne!(reuse_tx, order_tx);

        let txs = chain.transactions_from(payer.address()).await;
        let reuse = txs.iter().find(|t| t.id == reuse_tx).expect("reuse tx");
        assert_eq!(reuse.kind, kelp_chain::TransactionKind::ReuseOrder);
        assert_eq!(reuse.order_tx, Some(order_tx));

        // Only the 2 USDC fee moved; the payer held no DAI to re-pay with.
        assert_eq!(
            chain.balance(&usdc, payer.address()).await.expect("balance"),
            Amount::tokens(8.0)
        );
    }

    #[tokio::test]
    async fn test_expired_fee_maps_to_typed_error() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let usdc = addr();

        chain
            .register_dispenser(&asset.datatoken, Amount::tokens(1.0))
            .await
            .expect("register");
        chain
            .mint(&usdc, payer.address(), Amount::tokens(10.0))
            .await
            .expect("mint");

        let fee = kelp_chain::ProviderFee {
            address: addr(),
            token: usdc,
            amount: Amount::tokens(2.0),
            signature: kelp_chain::FeeSignature {
                v: 27,
                r: "0x00".to_string(),
                s: "0x00".to_string(),
            },
            valid_until: Utc::now() - Duration::minutes(1),
            provider_data: String::new(),
        };
        let init = InitializeResult {
            valid_order: None,
            provider_fee: Some(fee),
        };

        let result = service.acquire(&asset, &init, &payer).await;
        assert!(matches!(result, Err(OrderError::ProviderFeeExpired { .. })));
    }

    #[tokio::test]
    async fn test_underfunded_fresh_order_reverts() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let dai = addr();

        chain
            .register_fixed_rate(&asset.datatoken, &dai, Amount::tokens(10.0))
            .await
            .expect("register");
        // No DAI minted: allowance approval succeeds but the pull fails.
        let result = service.order_asset(&asset, &payer, in_half_an_hour()).await;
        assert!(matches!(result, Err(OrderError::OrderRevert { .. })));
    }
}
