//! Integration test crate for the Kelp order engine.
//!
//! This crate exists solely to run integration tests that span multiple Kelp crates.
//! It has no public API - all functionality is in the test modules.

#![forbid(unsafe_code)]
