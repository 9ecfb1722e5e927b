//! Chain client for datatoken operations.
//!
//! This module provides a client for the on-chain contracts the order
//! engine consumes: ERC20 allowance/approval, datatoken orders, fixed-rate
//! exchanges and dispensers. Currently uses a simulated backend for
//! development; the simulated chain enforces balances, allowance pulls and
//! provider-fee expiry, and records every submitted transaction.

use crate::amount::Amount;
use crate::error::{ChainError, Result};
use crate::fees::{ConsumeMarketFee, ProviderFee};
use crate::transaction::{Transaction, TransactionId, TransactionKind};
use crate::wallet::{Address, Wallet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Revert reason raised when a stale provider fee is submitted.
pub const FEE_EXPIRED_REASON: &str = "provider fee signature expired";

/// Network to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local development node.
    Localnet,
}

impl Network {
    /// Get the RPC URL for this network.
    #[must_use]
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://rpc.kelp.market",
            Self::Testnet => "https://rpc-test.kelp.market",
            Self::Localnet => "http://localhost:8545",
        }
    }
}

/// A fixed-rate exchange registered for a datatoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedRateExchange {
    /// Exchange id within the fixed-rate contract.
    pub exchange_id: String,
    /// Fixed-rate contract address (the base-token spender).
    pub contract: Address,
    /// Datatoken sold by this exchange.
    pub datatoken: Address,
    /// Base token the price is denominated in.
    pub base_token: Address,
    /// Constant price for one datatoken.
    pub price: Amount,
}

/// A dispenser registered for a datatoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispenser {
    /// Dispenser contract address.
    pub contract: Address,
    /// Datatoken handed out by this dispenser.
    pub datatoken: Address,
    /// Per-address balance cap enforced on dispense.
    pub max_balance: Amount,
}

/// An on-chain order record: one datatoken spent for one access right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Transaction id the order is referenced by.
    pub tx_id: TransactionId,
    /// Datatoken the order was placed against.
    pub datatoken: Address,
    /// Consumer the access right belongs to.
    pub consumer: Address,
    /// Account that paid for the order.
    pub payer: Address,
    /// Service index within the asset.
    pub service_index: u64,
    /// Order timestamp.
    pub created_at: DateTime<Utc>,
    /// Validity window of the provider fee last paid with this order, if
    /// any. The Provider service uses this to decide whether a fee must be
    /// re-paid on reuse.
    pub fee_valid_until: Option<DateTime<Utc>>,
}

/// Simulated chain state for development.
#[derive(Debug, Default)]
struct SimulatedState {
    /// Balances keyed by (token, owner).
    balances: HashMap<(String, String), Amount>,
    /// Allowances keyed by (token, owner, spender).
    allowances: HashMap<(String, String, String), Amount>,
    /// Fixed-rate exchanges keyed by datatoken address.
    exchanges: HashMap<String, FixedRateExchange>,
    /// Dispensers keyed by datatoken address.
    dispensers: HashMap<String, Dispenser>,
    /// Orders keyed by transaction id.
    orders: HashMap<String, OrderRecord>,
    /// All submitted transactions keyed by id.
    transactions: HashMap<String, Transaction>,
}

impl SimulatedState {
    fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.balances
            .get(&(token.as_str().to_string(), owner.as_str().to_string()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    fn credit(&mut self, token: &Address, owner: &Address, amount: Amount) {
        let entry = self
            .balances
            .entry((token.as_str().to_string(), owner.as_str().to_string()))
            .or_insert(Amount::ZERO);
        *entry = entry.saturating_add(amount);
    }

    fn debit(&mut self, token: &Address, owner: &Address, amount: Amount) -> Result<()> {
        let have = self.balance_of(token, owner);
        let remaining = have
            .checked_sub(amount)
            .ok_or_else(|| ChainError::InsufficientBalance {
                token: token.to_string(),
                have: have.to_decimal_string(),
                need: amount.to_decimal_string(),
            })?;
        self.balances.insert(
            (token.as_str().to_string(), owner.as_str().to_string()),
            remaining,
        );
        Ok(())
    }

    fn allowance_of(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(
                token.as_str().to_string(),
                owner.as_str().to_string(),
                spender.as_str().to_string(),
            ))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Pull `amount` of `token` from `owner` via `spender`, consuming the
    /// allowance the way ERC20 `transferFrom` does.
    fn pull(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        let approved = self.allowance_of(token, owner, spender);
        let remaining =
            approved
                .checked_sub(amount)
                .ok_or_else(|| ChainError::InsufficientAllowance {
                    spender: spender.to_string(),
                    have: approved.to_decimal_string(),
                    need: amount.to_decimal_string(),
                })?;
        self.debit(token, owner, amount)?;
        self.allowances.insert(
            (
                token.as_str().to_string(),
                owner.as_str().to_string(),
                spender.as_str().to_string(),
            ),
            remaining,
        );
        self.credit(token, to, amount);
        Ok(())
    }

    /// Settle a provider fee against the datatoken contract (the fee
    /// spender at settlement time). A missing or zero fee settles nothing.
    fn settle_provider_fee(
        &mut self,
        payer: &Address,
        datatoken: &Address,
        fee: Option<&ProviderFee>,
    ) -> Result<()> {
        let Some(fee) = fee else { return Ok(()) };
        if fee.is_zero() {
            return Ok(());
        }
        if fee.is_expired(Utc::now()) {
            return Err(ChainError::reverted(FEE_EXPIRED_REASON));
        }
        self.pull(&fee.token, payer, datatoken, &fee.address, fee.amount)
    }

    fn settle_consume_market_fee(
        &mut self,
        payer: &Address,
        fee: Option<&ConsumeMarketFee>,
    ) -> Result<()> {
        let Some(fee) = fee else { return Ok(()) };
        if fee.amount.is_zero() {
            return Ok(());
        }
        self.debit(&fee.token, payer, fee.amount)?;
        self.credit(&fee.token, &fee.address, fee.amount);
        Ok(())
    }

    /// Apply `f` atomically: on error every balance and allowance
    /// mutation is rolled back, the way a reverted chain transaction
    /// leaves no trace.
    fn transact(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let balances = self.balances.clone();
        let allowances = self.allowances.clone();
        let result = f(self);
        if result.is_err() {
            self.balances = balances;
            self.allowances = allowances;
        }
        result
    }

    fn record(&mut self, mut tx: Transaction) -> Transaction {
        tx.mark_submitted();
        tx.mark_confirmed();
        self.transactions.insert(tx.id.to_string(), tx.clone());
        tx
    }
}

fn fee_window(fee: Option<&ProviderFee>) -> Option<DateTime<Utc>> {
    fee.filter(|f| !f.is_zero()).map(|f| f.valid_until)
}

/// Chain client for datatoken and payment operations.
///
/// All mutating calls take an externally supplied [`Wallet`] and are
/// awaited to confirmation before the transaction is returned.
pub struct ChainClient {
    network: Network,
    state: Arc<Mutex<SimulatedState>>,
}

impl ChainClient {
    /// Create a new client for the given network.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            network,
            state: Arc::new(Mutex::new(SimulatedState::default())),
        }
    }

    /// Create a testnet client.
    #[must_use]
    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    /// Create a mainnet client.
    #[must_use]
    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    /// Create a localnet client.
    #[must_use]
    pub fn localnet() -> Self {
        Self::new(Network::Localnet)
    }

    /// Get the network.
    #[must_use]
    pub fn network(&self) -> Network {
        self.network
    }

    /// Get the RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &'static str {
        self.network.rpc_url()
    }

    /// Get the balance of `owner` in `token`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn balance(&self, token: &Address, owner: &Address) -> Result<Amount> {
        let state = self.state.lock().await;
        Ok(state.balance_of(token, owner))
    }

    /// Get the allowance of `spender` over `owner`'s `token`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount> {
        let state = self.state.lock().await;
        Ok(state.allowance_of(token, owner, spender))
    }

    /// Approve `spender` to pull up to `amount` of the signer's `token`.
    ///
    /// Sets the allowance to exactly `amount`; the approval is never
    /// widened or narrowed implicitly.
    ///
    /// # Errors
    ///
    /// Returns error if the approval transaction fails.
    pub async fn approve(
        &self,
        signer: &Wallet,
        token: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;
        state.allowances.insert(
            (
                token.as_str().to_string(),
                signer.address().as_str().to_string(),
                spender.as_str().to_string(),
            ),
            amount,
        );
        let tx = state.record(Transaction::new(
            TransactionKind::Approval,
            signer.address().clone(),
            token.clone(),
        ));

        debug!(
            owner = %signer.address(),
            spender = %spender,
            token = %token,
            amount = %amount,
            "approval confirmed"
        );
        Ok(tx)
    }

    /// Mint tokens to an address (test networks only).
    ///
    /// # Errors
    ///
    /// Returns error on mainnet.
    pub async fn mint(&self, token: &Address, to: &Address, amount: Amount) -> Result<()> {
        if self.network == Network::Mainnet {
            return Err(ChainError::network_error("mint not available on mainnet"));
        }
        let mut state = self.state.lock().await;
        state.credit(token, to, amount);
        debug!(token = %token, to = %to, amount = %amount, "minted");
        Ok(())
    }

    /// Register a fixed-rate exchange for a datatoken (factory-side setup).
    ///
    /// # Errors
    ///
    /// Returns error if registration fails.
    pub async fn register_fixed_rate(
        &self,
        datatoken: &Address,
        base_token: &Address,
        price: Amount,
    ) -> Result<FixedRateExchange> {
        let contract = contract_address()?;
        let exchange = FixedRateExchange {
            exchange_id: TransactionId::new().to_string(),
            contract,
            datatoken: datatoken.clone(),
            base_token: base_token.clone(),
            price,
        };
        let mut state = self.state.lock().await;
        state
            .exchanges
            .insert(datatoken.as_str().to_string(), exchange.clone());
        info!(datatoken = %datatoken, price = %price, "fixed-rate exchange registered");
        Ok(exchange)
    }

    /// Register a dispenser for a datatoken (factory-side setup).
    ///
    /// # Errors
    ///
    /// Returns error if registration fails.
    pub async fn register_dispenser(
        &self,
        datatoken: &Address,
        max_balance: Amount,
    ) -> Result<Dispenser> {
        let dispenser = Dispenser {
            contract: contract_address()?,
            datatoken: datatoken.clone(),
            max_balance,
        };
        let mut state = self.state.lock().await;
        state
            .dispensers
            .insert(datatoken.as_str().to_string(), dispenser.clone());
        info!(datatoken = %datatoken, "dispenser registered");
        Ok(dispenser)
    }

    /// Registry view: the fixed-rate exchange for a datatoken, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn fixed_rate_for(&self, datatoken: &Address) -> Result<Option<FixedRateExchange>> {
        let state = self.state.lock().await;
        Ok(state.exchanges.get(datatoken.as_str()).cloned())
    }

    /// Registry view: the dispenser for a datatoken, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn dispenser_for(&self, datatoken: &Address) -> Result<Option<Dispenser>> {
        let state = self.state.lock().await;
        Ok(state.dispensers.get(datatoken.as_str()).cloned())
    }

    /// Start an order: spend one datatoken for one access right, settling
    /// the provider fee (and consume-market fee, if any) in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns error on insufficient datatoken balance, an expired provider
    /// fee, or a failed fee pull.
    pub async fn start_order(
        &self,
        signer: &Wallet,
        datatoken: &Address,
        consumer: &Address,
        service_index: u64,
        provider_fee: Option<&ProviderFee>,
        consume_market_fee: Option<&ConsumeMarketFee>,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;
        state.transact(|s| {
            s.debit(datatoken, signer.address(), Amount::tokens(1.0))?;
            s.settle_provider_fee(signer.address(), datatoken, provider_fee)?;
            s.settle_consume_market_fee(signer.address(), consume_market_fee)
        })?;

        let tx = state.record(Transaction::new(
            TransactionKind::StartOrder,
            signer.address().clone(),
            datatoken.clone(),
        ));
        state.orders.insert(
            tx.id.to_string(),
            OrderRecord {
                tx_id: tx.id.clone(),
                datatoken: datatoken.clone(),
                consumer: consumer.clone(),
                payer: signer.address().clone(),
                service_index,
                created_at: Utc::now(),
                fee_valid_until: fee_window(provider_fee),
            },
        );

        info!(
            tx = %tx.id,
            datatoken = %datatoken,
            consumer = %consumer,
            service_index,
            "order started"
        );
        Ok(tx)
    }

    /// Re-validate an existing order by paying only a fresh provider fee.
    ///
    /// # Errors
    ///
    /// Returns error if the referenced order does not exist, the fee is
    /// expired, or the fee pull fails.
    pub async fn reuse_order(
        &self,
        signer: &Wallet,
        datatoken: &Address,
        order_tx_id: &TransactionId,
        provider_fee: Option<&ProviderFee>,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;
        if !state.orders.contains_key(order_tx_id.as_str()) {
            return Err(ChainError::OrderNotFound {
                tx_id: order_tx_id.to_string(),
            });
        }
        state.settle_provider_fee(signer.address(), datatoken, provider_fee)?;

        let window = fee_window(provider_fee);
        if let Some(order) = state.orders.get_mut(order_tx_id.as_str()) {
            if window.is_some() {
                order.fee_valid_until = window;
            }
        }

        let tx = state.record(
            Transaction::new(
                TransactionKind::ReuseOrder,
                signer.address().clone(),
                datatoken.clone(),
            )
            .with_order_tx(order_tx_id.clone()),
        );

        info!(tx = %tx.id, order = %order_tx_id, datatoken = %datatoken, "order reused");
        Ok(tx)
    }

    /// Buy one datatoken from the fixed-rate exchange and start the order
    /// atomically, paying both the price and the provider fee.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange is unknown, the price exceeds
    /// `max_base_amount`, the base-token allowance or balance is too low,
    /// or fee settlement fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn buy_from_fre_and_order(
        &self,
        signer: &Wallet,
        datatoken: &Address,
        exchange_id: &str,
        max_base_amount: Amount,
        consumer: &Address,
        service_index: u64,
        provider_fee: Option<&ProviderFee>,
        consume_market_fee: Option<&ConsumeMarketFee>,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;
        let exchange = state
            .exchanges
            .get(datatoken.as_str())
            .filter(|e| e.exchange_id == exchange_id)
            .cloned()
            .ok_or_else(|| ChainError::ExchangeNotFound {
                exchange_id: exchange_id.to_string(),
            })?;

        if exchange.price > max_base_amount {
            return Err(ChainError::reverted(format!(
                "price {} exceeds max base amount {}",
                exchange.price, max_base_amount
            )));
        }

        // Exchange pulls the price, datatoken is minted and consumed into
        // the order in the same transaction.
        let payer = signer.address().clone();
        state.transact(|s| {
            s.pull(
                &exchange.base_token,
                &payer,
                &exchange.contract,
                &exchange.contract,
                exchange.price,
            )?;
            s.settle_provider_fee(&payer, datatoken, provider_fee)?;
            s.settle_consume_market_fee(&payer, consume_market_fee)
        })?;

        let tx = state.record(Transaction::new(
            TransactionKind::BuyFromFreAndOrder,
            payer.clone(),
            datatoken.clone(),
        ));
        state.orders.insert(
            tx.id.to_string(),
            OrderRecord {
                tx_id: tx.id.clone(),
                datatoken: datatoken.clone(),
                consumer: consumer.clone(),
                payer,
                service_index,
                created_at: Utc::now(),
                fee_valid_until: fee_window(provider_fee),
            },
        );

        info!(
            tx = %tx.id,
            datatoken = %datatoken,
            price = %exchange.price,
            "bought from fixed-rate exchange and ordered"
        );
        Ok(tx)
    }

    /// Obtain datatokens from the dispenser, free of charge.
    ///
    /// # Errors
    ///
    /// Returns error if no dispenser is registered for the datatoken or the
    /// per-address balance cap would be exceeded.
    pub async fn dispense(
        &self,
        signer: &Wallet,
        datatoken: &Address,
        amount: Amount,
    ) -> Result<Transaction> {
        let mut state = self.state.lock().await;
        let dispenser = state
            .dispensers
            .get(datatoken.as_str())
            .cloned()
            .ok_or_else(|| ChainError::reverted("no dispenser registered"))?;

        let balance = state.balance_of(datatoken, signer.address());
        if balance.saturating_add(amount) > dispenser.max_balance {
            return Err(ChainError::reverted(format!(
                "dispense would exceed balance cap {}",
                dispenser.max_balance
            )));
        }
        state.credit(datatoken, signer.address(), amount);

        let tx = state.record(Transaction::new(
            TransactionKind::Dispense,
            signer.address().clone(),
            dispenser.contract.clone(),
        ));

        info!(tx = %tx.id, datatoken = %datatoken, amount = %amount, "dispensed");
        Ok(tx)
    }

    /// Get an order record by its transaction id.
    ///
    /// # Errors
    ///
    /// Returns error if no order exists under the id.
    pub async fn get_order(&self, tx_id: &TransactionId) -> Result<OrderRecord> {
        let state = self.state.lock().await;
        state
            .orders
            .get(tx_id.as_str())
            .cloned()
            .ok_or_else(|| ChainError::OrderNotFound {
                tx_id: tx_id.to_string(),
            })
    }

    /// Find the most recent order for `(datatoken, consumer, service_index)`.
    pub async fn find_order(
        &self,
        datatoken: &Address,
        consumer: &Address,
        service_index: u64,
    ) -> Option<OrderRecord> {
        let state = self.state.lock().await;
        state
            .orders
            .values()
            .filter(|o| {
                o.datatoken == *datatoken
                    && o.consumer == *consumer
                    && o.service_index == service_index
            })
            .max_by_key(|o| o.created_at)
            .cloned()
    }

    /// Get a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction is not found.
    pub async fn get_transaction(&self, id: &TransactionId) -> Result<Transaction> {
        let state = self.state.lock().await;
        state
            .transactions
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ChainError::TransactionNotFound { id: id.to_string() })
    }

    /// Total number of transactions submitted through this client.
    pub async fn transaction_count(&self) -> usize {
        let state = self.state.lock().await;
        state.transactions.len()
    }

    /// All transactions signed by `from`, oldest first.
    pub async fn transactions_from(&self, from: &Address) -> Vec<Transaction> {
        let state = self.state.lock().await;
        let mut txs: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.from == *from)
            .cloned()
            .collect();
        txs.sort_by_key(|t| t.created_at);
        txs
    }
}

/// Generate a fresh synthetic contract address.
fn contract_address() -> Result<Address> {
    let digest = Sha256::digest(uuid::Uuid::new_v4().as_bytes());
    Address::from_bytes(&digest[..20])
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url())
            .finish_non_exhaustive()
    }
}
