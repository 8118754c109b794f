//! Runtime configuration for the issue workflow service.

use crate::workflow::domain::{PayloadKey, WorkflowDomainError, WorkspaceId};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Configuration of one workflow service instance.
///
/// Deserializes from any serde format; absent fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Workspace every operation is scoped to.
    pub workspace_id: WorkspaceId,
    /// Extra issue payload fields the workspace accepts.
    pub payload_fields: BTreeSet<PayloadKey>,
}

impl WorkflowConfig {
    /// Creates a configuration scoped to `workspace_id` with no payload
    /// fields.
    #[must_use]
    pub const fn new(workspace_id: WorkspaceId) -> Self {
        Self {
            workspace_id,
            payload_fields: BTreeSet::new(),
        }
    }

    /// Declares an accepted payload field.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::UnknownPayloadField`] when `key` is not
    /// a well-formed payload key.
    pub fn with_payload_field(
        mut self,
        key: impl Into<String>,
    ) -> Result<Self, WorkflowDomainError> {
        self.payload_fields.insert(PayloadKey::new(key)?);
        Ok(self)
    }

    /// Resolves a raw key against the declared payload fields.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::UnknownPayloadField`] when the key is
    /// malformed or not declared.
    pub fn payload_key(&self, raw: &str) -> Result<PayloadKey, WorkflowDomainError> {
        let key = PayloadKey::new(raw)?;
        if self.payload_fields.contains(&key) {
            Ok(key)
        } else {
            Err(WorkflowDomainError::UnknownPayloadField(raw.to_owned()))
        }
    }
}
