//! # kelp-chain
//!
//! Chain primitives and the datatoken contract client for the Kelp data
//! marketplace.
//!
//! This crate provides:
//! - Wallet management (keypair generation, signing, address derivation)
//! - Token amounts (18-decimal base units, decimal-string conversion)
//! - Datatoken order operations (start, reuse, fixed-rate buy, dispense)
//! - ERC20 allowance and approval
//! - Fixed-rate exchange and dispenser registry views
//!
//! ## Example
//!
//! ```rust,no_run
//! use kelp_chain::{Amount, ChainClient, Wallet};
//!
//! # async fn example() -> kelp_chain::Result<()> {
//! let payer = Wallet::generate()?;
//! let datatoken = Wallet::generate()?.address().clone();
//!
//! let chain = ChainClient::testnet();
//! chain.mint(&datatoken, payer.address(), Amount::tokens(1.0)).await?;
//!
//! // Spend one datatoken for one access right.
//! let tx = chain
//!     .start_order(&payer, &datatoken, payer.address(), 0, None, None)
//!     .await?;
//! println!("order: {}", tx.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod client;
pub mod error;
pub mod fees;
pub mod transaction;
pub mod wallet;

pub use amount::Amount;
pub use client::{
    ChainClient, Dispenser, FixedRateExchange, Network, OrderRecord, FEE_EXPIRED_REASON,
};
pub use error::{ChainError, Result};
pub use fees::{ConsumeMarketFee, FeeSignature, ProviderFee};
pub use transaction::{Transaction, TransactionId, TransactionKind, TransactionStatus};
pub use wallet::{Address, Wallet};

/// Token decimals used throughout the marketplace.
pub const TOKEN_DECIMALS: u8 = 18;

/// One token in base units (wei).
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;
