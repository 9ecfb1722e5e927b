//! # kelp-provider
//!
//! Client for the Kelp Provider service: per-asset initialization, compute
//! environment listing, and compute job start.
//!
//! The Provider is the delivery gatekeeper - it alone decides whether an
//! existing order is still valid and whether a provider fee must accompany
//! the next request. This crate exposes those decisions to the order engine
//! as [`InitializeResult`]s.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod asset;
pub mod client;
pub mod environment;
pub mod error;
pub mod init;

pub use asset::AssetRef;
pub use client::{
    ComputeJob, ComputeJobRequest, ComputeJobStatus, FeePolicy, ProviderClient,
};
pub use environment::ComputeEnvironment;
pub use error::{ProviderError, Result};
pub use init::{ComputeInitializeResult, InitializeResult};
