//! Pipeline, task and step records backing an issue.

use super::{
    DatabaseId, EnvironmentId, InstanceId, IssueId, PipelineId, PipelineStatus, PrincipalId,
    StepId, TaskId, TaskStatus, WorkflowDomainError, WorkspaceId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Creator and update bookkeeping shared by every workflow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Principal that created the record.
    pub creator: PrincipalId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Principal that last updated the record.
    pub updater: PrincipalId,
    /// Latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl AuditStamp {
    /// Creates a stamp for a record created now by `actor`.
    #[must_use]
    pub fn created_by(actor: PrincipalId, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            creator: actor,
            created_at: timestamp,
            updater: actor,
            updated_at: timestamp,
        }
    }

    /// Records an update by `actor` at the current clock time.
    pub fn touch(&mut self, actor: PrincipalId, clock: &impl Clock) {
        self.updater = actor;
        self.updated_at = clock.utc();
    }
}

/// Supported task types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Run an arbitrary statement.
    #[serde(rename = "bb.task.general")]
    General,
    /// Create a database.
    #[serde(rename = "bb.task.database.create")]
    DatabaseCreate,
    /// Apply a schema change to an existing database.
    #[serde(rename = "bb.task.database.schema.update")]
    SchemaUpdate,
}

impl TaskType {
    /// Returns the canonical task type identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "bb.task.general",
            Self::DatabaseCreate => "bb.task.database.create",
            Self::SchemaUpdate => "bb.task.database.schema.update",
        }
    }
}

impl TryFrom<&str> for TaskType {
    type Error = WorkflowDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "bb.task.general" => Ok(Self::General),
            "bb.task.database.create" => Ok(Self::DatabaseCreate),
            "bb.task.database.schema.update" => Ok(Self::SchemaUpdate),
            _ => Err(WorkflowDomainError::UnknownTaskType(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific task payload; exactly one shape per task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskPayload {
    /// Payload of [`TaskType::General`].
    #[serde(rename = "bb.task.general")]
    General {
        /// Statement to execute.
        statement: String,
    },
    /// Payload of [`TaskType::DatabaseCreate`].
    #[serde(rename = "bb.task.database.create")]
    DatabaseCreate {
        /// Statement creating the database.
        statement: String,
        /// Name of the database to create.
        database_name: String,
        /// Character set of the new database.
        character_set: String,
        /// Collation of the new database.
        collation: String,
    },
    /// Payload of [`TaskType::SchemaUpdate`].
    #[serde(rename = "bb.task.database.schema.update")]
    SchemaUpdate {
        /// Forward migration statement.
        statement: String,
        /// Statement undoing the migration.
        rollback_statement: String,
    },
}

impl TaskPayload {
    /// Returns the task type implied by this payload shape.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        match self {
            Self::General { .. } => TaskType::General,
            Self::DatabaseCreate { .. } => TaskType::DatabaseCreate,
            Self::SchemaUpdate { .. } => TaskType::SchemaUpdate,
        }
    }

    /// Returns the statement every payload shape carries.
    #[must_use]
    pub fn statement(&self) -> &str {
        match self {
            Self::General { statement }
            | Self::DatabaseCreate { statement, .. }
            | Self::SchemaUpdate { statement, .. } => statement,
        }
    }
}

/// Execution plan backing an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    id: PipelineId,
    workspace_id: WorkspaceId,
    name: String,
    status: PipelineStatus,
    stamp: AuditStamp,
}

impl Pipeline {
    /// Creates a pipeline in its creation status.
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        name: impl Into<String>,
        creator: PrincipalId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: PipelineId::new(),
            workspace_id,
            name: name.into(),
            status: PipelineStatus::ON_CREATION,
            stamp: AuditStamp::created_by(creator, clock),
        }
    }

    /// Reconstructs a pipeline from persisted storage.
    #[must_use]
    pub const fn from_persisted(
        id: PipelineId,
        workspace_id: WorkspaceId,
        name: String,
        status: PipelineStatus,
        stamp: AuditStamp,
    ) -> Self {
        Self {
            id,
            workspace_id,
            name,
            status,
            stamp,
        }
    }

    /// Returns the pipeline identifier.
    #[must_use]
    pub const fn id(&self) -> PipelineId {
        self.id
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pipeline status.
    #[must_use]
    pub const fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Returns creator and update bookkeeping.
    #[must_use]
    pub const fn stamp(&self) -> &AuditStamp {
        &self.stamp
    }

    /// Sets the pipeline status.
    pub fn set_status(&mut self, status: PipelineStatus, actor: PrincipalId, clock: &impl Clock) {
        self.status = status;
        self.stamp.touch(actor, clock);
    }
}

/// Target of a task: the instance and, optionally, one of its databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTarget {
    /// Instance the task runs against.
    pub instance_id: InstanceId,
    /// Database the task runs against; absent for database creation.
    pub database_id: Option<DatabaseId>,
    /// Environment of the instance.
    pub environment_id: Option<EnvironmentId>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Position within the pipeline.
    pub position: u32,
    /// Task name.
    pub name: String,
    /// Task status.
    pub status: TaskStatus,
    /// Task target.
    pub target: TaskTarget,
    /// Type-specific payload.
    pub payload: TaskPayload,
    /// Bookkeeping.
    pub stamp: AuditStamp,
}

/// One schedulable unit of work within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    pipeline_id: PipelineId,
    position: u32,
    name: String,
    status: TaskStatus,
    target: TaskTarget,
    payload: TaskPayload,
    stamp: AuditStamp,
}

impl Task {
    /// Creates a pending task at `position` within `pipeline_id`.
    #[must_use]
    pub fn new(
        pipeline_id: PipelineId,
        position: u32,
        name: impl Into<String>,
        target: TaskTarget,
        payload: TaskPayload,
        creator: PrincipalId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: TaskId::new(),
            pipeline_id,
            position,
            name: name.into(),
            status: TaskStatus::Pending,
            target,
            payload,
            stamp: AuditStamp::created_by(creator, clock),
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            pipeline_id: data.pipeline_id,
            position: data.position,
            name: data.name,
            status: data.status,
            target: data.target,
            payload: data.payload,
            stamp: data.stamp,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning pipeline.
    #[must_use]
    pub const fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Returns the position within the pipeline.
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Returns the task target.
    #[must_use]
    pub const fn target(&self) -> &TaskTarget {
        &self.target
    }

    /// Returns the type-specific payload.
    #[must_use]
    pub const fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Returns creator and update bookkeeping.
    #[must_use]
    pub const fn stamp(&self) -> &AuditStamp {
        &self.stamp
    }

    /// Sets the task status.
    pub fn set_status(&mut self, status: TaskStatus, actor: PrincipalId, clock: &impl Clock) {
        self.status = status;
        self.stamp.touch(actor, clock);
    }
}

/// Parameter object for reconstructing a persisted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedStepData {
    /// Persisted step identifier.
    pub id: StepId,
    /// Owning task.
    pub task_id: TaskId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Owning issue.
    pub issue_id: IssueId,
    /// Position within the task.
    pub position: u32,
    /// Step name.
    pub name: String,
    /// Step status.
    pub status: TaskStatus,
    /// Bookkeeping.
    pub stamp: AuditStamp,
}

/// A sub-unit of progress within a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    id: StepId,
    task_id: TaskId,
    pipeline_id: PipelineId,
    issue_id: IssueId,
    position: u32,
    name: String,
    status: TaskStatus,
    stamp: AuditStamp,
}

impl Step {
    /// Creates a pending step at `position` within `task`.
    #[must_use]
    pub fn new(
        task: &Task,
        issue_id: IssueId,
        position: u32,
        name: impl Into<String>,
        creator: PrincipalId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: StepId::new(),
            task_id: task.id(),
            pipeline_id: task.pipeline_id(),
            issue_id,
            position,
            name: name.into(),
            status: TaskStatus::Pending,
            stamp: AuditStamp::created_by(creator, clock),
        }
    }

    /// Reconstructs a step from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedStepData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            pipeline_id: data.pipeline_id,
            issue_id: data.issue_id,
            position: data.position,
            name: data.name,
            status: data.status,
            stamp: data.stamp,
        }
    }

    /// Returns the step identifier.
    #[must_use]
    pub const fn id(&self) -> StepId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the owning pipeline.
    #[must_use]
    pub const fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Returns the owning issue.
    #[must_use]
    pub const fn issue_id(&self) -> IssueId {
        self.issue_id
    }

    /// Returns the position within the task.
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the step status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns creator and update bookkeeping.
    #[must_use]
    pub const fn stamp(&self) -> &AuditStamp {
        &self.stamp
    }

    /// Sets the step status.
    pub fn set_status(&mut self, status: TaskStatus, actor: PrincipalId, clock: &impl Clock) {
        self.status = status;
        self.stamp.touch(actor, clock);
    }
}

/// A task together with its ordered steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWithSteps {
    /// The task.
    pub task: Task,
    /// Steps ordered by position.
    pub steps: Vec<Step>,
}

/// A pipeline with its ordered tasks and their steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSnapshot {
    /// The pipeline.
    pub pipeline: Pipeline,
    /// Tasks ordered by position.
    pub tasks: Vec<TaskWithSteps>,
}

impl PipelineSnapshot {
    /// Finds a task by identifier.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks
            .iter()
            .map(|entry| &entry.task)
            .find(|task| task.id() == task_id)
    }
}
