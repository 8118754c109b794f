//! Record store port with atomic unit-of-work commits.

use crate::workflow::domain::{
    Activity, Issue, IssueId, Message, Pipeline, PipelineId, PipelineSnapshot, PrincipalId,
    ProjectId, Step, Task, WorkspaceId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for workflow store operations.
pub type WorkflowStoreResult<T> = Result<T, WorkflowStoreError>;

/// Filter applied when listing issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueFilter {
    /// Keep issues the principal created, is assigned to, or subscribes to.
    pub principal: Option<PrincipalId>,
    /// Keep issues of this project.
    pub project: Option<ProjectId>,
}

impl IssueFilter {
    /// Creates a filter matching every issue.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            principal: None,
            project: None,
        }
    }

    /// Restricts the filter to issues involving `principal`.
    #[must_use]
    pub const fn with_principal(mut self, principal: PrincipalId) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Restricts the filter to issues of `project`.
    #[must_use]
    pub const fn with_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    /// Returns whether `issue` passes the filter.
    #[must_use]
    pub fn matches(&self, issue: &Issue) -> bool {
        self.principal
            .is_none_or(|principal| issue.involves(principal))
            && self
                .project
                .is_none_or(|project| issue.project_id() == project)
    }
}

/// Insert-or-update write of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite<T> {
    /// The record is new.
    Insert(T),
    /// The record already exists and is replaced.
    Update(T),
}

impl<T> RecordWrite<T> {
    /// Returns the written record.
    #[must_use]
    pub const fn record(&self) -> &T {
        match self {
            Self::Insert(record) | Self::Update(record) => record,
        }
    }
}

/// Write of the issue at the root of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueWrite {
    /// A newly opened issue.
    Insert(Issue),
    /// An updated issue, read at `expected_version`.
    Update {
        /// The updated issue.
        issue: Issue,
        /// Version the issue had when it was read.
        expected_version: u64,
    },
}

impl IssueWrite {
    /// Returns the written issue.
    #[must_use]
    pub const fn issue(&self) -> &Issue {
        match self {
            Self::Insert(issue) | Self::Update { issue, .. } => issue,
        }
    }
}

/// Every record write derived from one workflow operation.
///
/// A store commits a unit of work entirely or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    /// The issue write.
    pub issue: IssueWrite,
    /// The pipeline write, if the operation touched the pipeline.
    pub pipeline: Option<RecordWrite<Pipeline>>,
    /// Task writes.
    pub tasks: Vec<RecordWrite<Task>>,
    /// Step writes.
    pub steps: Vec<RecordWrite<Step>>,
    /// The audit record describing the operation.
    pub activity: Activity,
    /// Notifications produced by the operation.
    pub messages: Vec<Message>,
}

impl UnitOfWork {
    /// Starts a unit of work opening `issue`.
    #[must_use]
    pub const fn create(issue: Issue, activity: Activity) -> Self {
        Self {
            issue: IssueWrite::Insert(issue),
            pipeline: None,
            tasks: Vec::new(),
            steps: Vec::new(),
            activity,
            messages: Vec::new(),
        }
    }

    /// Starts a unit of work updating `issue`, read at `expected_version`.
    #[must_use]
    pub const fn update(issue: Issue, expected_version: u64, activity: Activity) -> Self {
        Self {
            issue: IssueWrite::Update {
                issue,
                expected_version,
            },
            pipeline: None,
            tasks: Vec::new(),
            steps: Vec::new(),
            activity,
            messages: Vec::new(),
        }
    }

    /// Adds the pipeline write.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: RecordWrite<Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Adds task writes.
    #[must_use]
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = RecordWrite<Task>>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Adds step writes.
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = RecordWrite<Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Adds notification messages.
    #[must_use]
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }
}

/// Workspace-scoped persistence contract for workflow records.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Finds an issue by identifier within a workspace.
    ///
    /// Returns `None` when the issue does not exist in the workspace.
    async fn find_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Option<Issue>>;

    /// Lists the workspace's issues passing `filter`, ordered by creation.
    async fn list_issues(
        &self,
        workspace_id: WorkspaceId,
        filter: IssueFilter,
    ) -> WorkflowStoreResult<Vec<Issue>>;

    /// Loads a pipeline with its ordered tasks and steps.
    ///
    /// Returns `None` when the pipeline does not exist in the workspace.
    async fn find_pipeline(
        &self,
        workspace_id: WorkspaceId,
        pipeline_id: PipelineId,
    ) -> WorkflowStoreResult<Option<PipelineSnapshot>>;

    /// Returns the activities recorded for an issue, ordered by creation.
    async fn activities_for_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Activity>>;

    /// Returns the messages addressed to a principal, ordered by creation.
    async fn messages_for_receiver(
        &self,
        workspace_id: WorkspaceId,
        receiver: PrincipalId,
    ) -> WorkflowStoreResult<Vec<Message>>;

    /// Commits every write of `work` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::VersionConflict`] when the issue moved
    /// past the expected version, [`WorkflowStoreError::DuplicateRecord`] when
    /// an inserted record already exists, or
    /// [`WorkflowStoreError::MissingRecord`] when an updated record does not.
    /// Nothing is written on error.
    async fn commit(&self, work: UnitOfWork) -> WorkflowStoreResult<()>;
}

/// Errors returned by workflow store implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowStoreError {
    /// An inserted record already exists.
    #[error("duplicate {entity} record: {id}")]
    DuplicateRecord {
        /// Record kind.
        entity: &'static str,
        /// Record identifier.
        id: Uuid,
    },

    /// An updated record does not exist.
    #[error("{entity} record not found: {id}")]
    MissingRecord {
        /// Record kind.
        entity: &'static str,
        /// Record identifier.
        id: Uuid,
    },

    /// The issue was modified concurrently.
    #[error(
        "issue {issue_id} was modified concurrently (expected version {expected}, found {found})"
    )]
    VersionConflict {
        /// Contended issue.
        issue_id: IssueId,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkflowStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    pub(crate) const fn duplicate(entity: &'static str, id: Uuid) -> Self {
        Self::DuplicateRecord { entity, id }
    }

    pub(crate) const fn missing(entity: &'static str, id: Uuid) -> Self {
        Self::MissingRecord { entity, id }
    }
}
