//! Asset references.

use kelp_chain::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a consumable resource (a dataset or algorithm service).
///
/// Immutable once created; the datatoken address must resolve to a deployed
/// datatoken recognized by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    /// Document id (DID) of the asset.
    pub document_id: String,
    /// Service id within the asset's offering.
    pub service_id: String,
    /// Index of the service, as it appears on-chain.
    pub service_index: u64,
    /// Datatoken gating access to the service.
    pub datatoken: Address,
}

impl AssetRef {
    /// Create a new asset reference.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        service_id: impl Into<String>,
        service_index: u64,
        datatoken: Address,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            service_id: service_id.into(),
            service_index,
            datatoken,
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_id, self.service_id)
    }
}
