//! # kelp-order
//!
//! Order resolution engine: turns "I want to consume this asset" into the
//! minimal set of confirmed on-chain transactions, and orchestrates the
//! multi-asset acquisition a compute job needs.
//!
//! The engine never pays twice for rights it already holds. The Provider's
//! initialization response is the source of truth for whether an existing
//! order is still valid; the chain's registered pricing (fixed-rate
//! exchange or dispenser) decides how a fresh order is paid for.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use kelp_chain::{ChainClient, Wallet};
//! use kelp_provider::{AssetRef, ProviderClient};
//! use kelp_order::OrderService;
//!
//! # async fn example(asset: AssetRef) -> kelp_order::Result<()> {
//! let chain = Arc::new(ChainClient::testnet());
//! let provider = Arc::new(ProviderClient::simulated(Arc::clone(&chain))?);
//! let service = OrderService::new(chain, provider);
//!
//! let wallet = Wallet::generate()?;
//! let order_tx = service
//!     .order_asset(&asset, &wallet, Utc::now() + Duration::hours(1))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod acquire;
pub mod allowance;
pub mod compute;
pub mod error;
pub mod pricing;
pub mod reuse;

pub use acquire::OrderService;
pub use allowance::{ensure_allowance, ApprovalOutcome};
pub use compute::ComputeJobHandles;
pub use error::{AcquiredOrders, OrderError, Result};
pub use pricing::{classify_pricing, DispenserParams, FixedRateParams, PricingSchema};
pub use reuse::{decide_action, OrderAction};
