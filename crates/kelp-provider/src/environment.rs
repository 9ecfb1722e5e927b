//! Compute environments offered by the Provider.

use serde::{Deserialize, Serialize};

/// A Provider-side execution context for compute jobs.
///
/// Free environments return zero provider fees and enforce their own job
/// and duration ceilings; paid environments price each asset per request.
/// The orchestrator treats both identically - only fee magnitudes differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeEnvironment {
    /// Environment id, chosen by the caller when preparing a job.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether jobs in this environment are free of provider fees.
    pub free: bool,
    /// Maximum concurrent jobs per consumer.
    pub max_jobs: u32,
    /// Maximum job duration in seconds.
    pub max_duration_secs: u64,
}

impl ComputeEnvironment {
    /// Create a free environment.
    #[must_use]
    pub fn free(id: impl Into<String>, max_jobs: u32, max_duration_secs: u64) -> Self {
        Self {
            id: id.into(),
            description: "free compute environment".to_string(),
            free: true,
            max_jobs,
            max_duration_secs,
        }
    }

    /// Create a paid environment.
    #[must_use]
    pub fn paid(id: impl Into<String>, max_jobs: u32, max_duration_secs: u64) -> Self {
        Self {
            id: id.into(),
            description: "paid compute environment".to_string(),
            free: false,
            max_jobs,
            max_duration_secs,
        }
    }
}
