//! Lookup port for records an issue references but the workflow does not
//! own: projects, principals and the deployment targets of its tasks.

use async_trait::async_trait;
use std::fmt;

use super::store::WorkflowStoreResult;
use crate::workflow::domain::{
    DatabaseId, EnvironmentId, InstanceId, PrincipalId, ProjectId, WorkspaceId,
};

/// One external reference carried by a creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// The project the issue belongs to.
    Project(ProjectId),
    /// The creator or assignee.
    Principal(PrincipalId),
    /// A task's target instance.
    Instance(InstanceId),
    /// A task's target database.
    Database(DatabaseId),
    /// A task's target environment.
    Environment(EnvironmentId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project {id}"),
            Self::Principal(id) => write!(f, "principal {id}"),
            Self::Instance(id) => write!(f, "instance {id}"),
            Self::Database(id) => write!(f, "database {id}"),
            Self::Environment(id) => write!(f, "environment {id}"),
        }
    }
}

/// Resolves references against the records of a workspace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    /// Returns whether `reference` names an existing record of the
    /// workspace.
    ///
    /// # Errors
    ///
    /// Returns a store error when the lookup itself fails.
    async fn contains(
        &self,
        workspace_id: WorkspaceId,
        reference: EntityRef,
    ) -> WorkflowStoreResult<bool>;
}
