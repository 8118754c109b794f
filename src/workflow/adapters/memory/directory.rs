//! In-memory reference directory.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::workflow::{
    domain::WorkspaceId,
    ports::{EntityRef, ReferenceDirectory, WorkflowStoreError, WorkflowStoreResult},
};

/// Directory answering from references registered up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    known: Arc<RwLock<HashSet<(WorkspaceId, EntityRef)>>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers references as existing in `workspace_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::Persistence`] if the directory lock is
    /// poisoned.
    pub fn register(
        &self,
        workspace_id: WorkspaceId,
        references: impl IntoIterator<Item = EntityRef>,
    ) -> WorkflowStoreResult<()> {
        let mut known = self.known.write().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        known.extend(
            references
                .into_iter()
                .map(|reference| (workspace_id, reference)),
        );
        Ok(())
    }
}

#[async_trait]
impl ReferenceDirectory for InMemoryDirectory {
    async fn contains(
        &self,
        workspace_id: WorkspaceId,
        reference: EntityRef,
    ) -> WorkflowStoreResult<bool> {
        let known = self.known.read().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(known.contains(&(workspace_id, reference)))
    }
}
