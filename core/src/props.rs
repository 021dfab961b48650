//! Bulk property edits pushed to an external service.

use std::collections::BTreeMap;

use crate::scene::{EndpointMetadata, EntityId};

/// External service that persists property edits.
///
/// The endpoint metadata is handed over exactly as the loader provided it.
pub trait PropertyUpdateService {
    fn update_properties(
        &mut self,
        endpoint: &EndpointMetadata,
        props: &BTreeMap<String, serde_json::Value>,
    ) -> anyhow::Result<()>;
}

/// Outcome of a bulk update, per entity.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropsUpdateReport {
    /// Entities whose update the service accepted
    pub updated: Vec<EntityId>,
    /// Entities without endpoint metadata
    pub skipped: Vec<EntityId>,
    /// Entities the service rejected, with the error message
    pub failed: Vec<(EntityId, String)>,
}

impl PropsUpdateReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}
