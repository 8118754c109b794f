//! Request payloads accepted by the issue workflow service.

use crate::workflow::{
    domain::{
        DatabaseId, EnvironmentId, InstanceId, IssueId, IssueStatus, PrincipalId, ProjectId,
        TaskId, TaskPayload, TaskStatus, TaskTarget, TaskType, WorkflowDomainError,
    },
    ports::EntityRef,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Definition of one task of a pipeline about to be created.
///
/// The task type arrives as its string identifier and is checked against
/// the fields supplied when the request is turned into a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    name: String,
    task_type: String,
    instance_id: InstanceId,
    database_id: Option<DatabaseId>,
    environment_id: Option<EnvironmentId>,
    statement: Option<String>,
    rollback_statement: Option<String>,
    database_name: Option<String>,
    character_set: Option<String>,
    collation: Option<String>,
    steps: Vec<String>,
}

impl TaskDefinition {
    /// Creates a task definition with its required attributes.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        task_type: impl Into<String>,
        instance_id: InstanceId,
    ) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            instance_id,
            database_id: None,
            environment_id: None,
            statement: None,
            rollback_statement: None,
            database_name: None,
            character_set: None,
            collation: None,
            steps: Vec::new(),
        }
    }

    /// Sets the target database. [`DatabaseId::EMPTY`] means no database.
    #[must_use]
    pub const fn with_database(mut self, database_id: DatabaseId) -> Self {
        self.database_id = Some(database_id);
        self
    }

    /// Sets the target environment.
    #[must_use]
    pub const fn with_environment(mut self, environment_id: EnvironmentId) -> Self {
        self.environment_id = Some(environment_id);
        self
    }

    /// Sets the statement to run.
    #[must_use]
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    /// Sets the rollback statement of a schema update.
    #[must_use]
    pub fn with_rollback_statement(mut self, statement: impl Into<String>) -> Self {
        self.rollback_statement = Some(statement.into());
        self
    }

    /// Sets the database to create, with its character set and collation.
    #[must_use]
    pub fn with_new_database(
        mut self,
        database_name: impl Into<String>,
        character_set: impl Into<String>,
        collation: impl Into<String>,
    ) -> Self {
        self.database_name = Some(database_name.into());
        self.character_set = Some(character_set.into());
        self.collation = Some(collation.into());
        self
    }

    /// Appends steps, in order.
    #[must_use]
    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.extend(steps.into_iter().map(Into::into));
        self
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the step names, in order.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Returns the task target, mapping the empty database sentinel to none.
    #[must_use]
    pub fn target(&self) -> TaskTarget {
        TaskTarget {
            instance_id: self.instance_id,
            database_id: self.database_id.and_then(DatabaseId::non_empty),
            environment_id: self.environment_id,
        }
    }

    /// Builds the typed payload for the declared task type.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::UnknownTaskType`] for an unrecognized
    /// type and [`WorkflowDomainError::MissingTaskField`] when the type's
    /// payload shape lacks a required field.
    pub fn payload(&self) -> Result<TaskPayload, WorkflowDomainError> {
        let task_type = TaskType::try_from(self.task_type.as_str())?;
        let require = |value: &Option<String>, field: &'static str| {
            value
                .clone()
                .ok_or(WorkflowDomainError::MissingTaskField {
                    task_type: task_type.as_str(),
                    field,
                })
        };

        Ok(match task_type {
            TaskType::General => TaskPayload::General {
                statement: require(&self.statement, "statement")?,
            },
            TaskType::DatabaseCreate => TaskPayload::DatabaseCreate {
                statement: require(&self.statement, "statement")?,
                database_name: require(&self.database_name, "database_name")?,
                character_set: self.character_set.clone().unwrap_or_default(),
                collation: self.collation.clone().unwrap_or_default(),
            },
            TaskType::SchemaUpdate => TaskPayload::SchemaUpdate {
                statement: require(&self.statement, "statement")?,
                rollback_statement: self.rollback_statement.clone().unwrap_or_default(),
            },
        })
    }
}

/// Definition of the pipeline created together with an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,
    tasks: Vec<TaskDefinition>,
}

impl PipelineDefinition {
    /// Creates a pipeline definition without tasks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Appends a task.
    #[must_use]
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task definitions, in order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }
}

/// Request payload for opening an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIssueRequest {
    pub(crate) project_id: ProjectId,
    pub(crate) name: String,
    pub(crate) creator: PrincipalId,
    pub(crate) description: String,
    pub(crate) assignee: Option<PrincipalId>,
    pub(crate) sql: Option<String>,
    pub(crate) rollback_sql: Option<String>,
    pub(crate) payload: BTreeMap<String, Value>,
    pub(crate) pipeline: Option<PipelineDefinition>,
}

impl CreateIssueRequest {
    /// Creates a request with the required issue attributes.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>, creator: PrincipalId) -> Self {
        Self {
            project_id,
            name: name.into(),
            creator,
            description: String::new(),
            assignee: None,
            sql: None,
            rollback_sql: None,
            payload: BTreeMap::new(),
            pipeline: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the initial assignee.
    #[must_use]
    pub const fn with_assignee(mut self, assignee: PrincipalId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Sets the forward SQL statement.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Sets the rollback SQL statement.
    #[must_use]
    pub fn with_rollback_sql(mut self, rollback_sql: impl Into<String>) -> Self {
        self.rollback_sql = Some(rollback_sql.into());
        self
    }

    /// Sets an initial extra payload field.
    #[must_use]
    pub fn with_payload_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Attaches the pipeline to create with the issue.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineDefinition) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Returns the external references of the request in request order,
    /// each once. An empty database sentinel is not a reference.
    #[must_use]
    pub(crate) fn references(&self) -> Vec<EntityRef> {
        let mut references = vec![
            EntityRef::Project(self.project_id),
            EntityRef::Principal(self.creator),
        ];
        references.extend(self.assignee.map(EntityRef::Principal));
        for task in self.pipeline.iter().flat_map(PipelineDefinition::tasks) {
            let target = task.target();
            references.push(EntityRef::Instance(target.instance_id));
            references.extend(target.database_id.map(EntityRef::Database));
            references.extend(target.environment_id.map(EntityRef::Environment));
        }
        let mut seen = HashSet::new();
        references.retain(|reference| seen.insert(*reference));
        references
    }
}

/// Requested status of one pipeline task, set through an issue patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatusPatch {
    /// Task to update; it must belong to the issue's pipeline.
    pub task_id: TaskId,
    /// New task status.
    pub status: TaskStatus,
}

/// Request payload for editing issue fields.
///
/// Only the fields that were set are compared and written.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchIssueRequest {
    pub(crate) issue_id: IssueId,
    pub(crate) actor: PrincipalId,
    pub(crate) comment: String,
    pub(crate) assignee: Option<PrincipalId>,
    pub(crate) description: Option<String>,
    pub(crate) subscribers: Option<Vec<PrincipalId>>,
    pub(crate) sql: Option<String>,
    pub(crate) rollback_sql: Option<String>,
    pub(crate) payload: BTreeMap<String, Value>,
    pub(crate) task_status: Option<TaskStatusPatch>,
}

impl PatchIssueRequest {
    /// Creates an empty patch of `issue_id` by `actor`.
    #[must_use]
    pub const fn new(issue_id: IssueId, actor: PrincipalId) -> Self {
        Self {
            issue_id,
            actor,
            comment: String::new(),
            assignee: None,
            description: None,
            subscribers: None,
            sql: None,
            rollback_sql: None,
            payload: BTreeMap::new(),
            task_status: None,
        }
    }

    /// Sets the activity comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the assignee.
    #[must_use]
    pub const fn with_assignee(mut self, assignee: PrincipalId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Sets the description. An empty string is a valid value.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replaces the subscriber list.
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: impl IntoIterator<Item = PrincipalId>) -> Self {
        self.subscribers = Some(subscribers.into_iter().collect());
        self
    }

    /// Sets the forward SQL statement.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Sets the rollback SQL statement.
    #[must_use]
    pub fn with_rollback_sql(mut self, rollback_sql: impl Into<String>) -> Self {
        self.rollback_sql = Some(rollback_sql.into());
        self
    }

    /// Sets an extra payload field; `Value::Null` clears it.
    #[must_use]
    pub fn with_payload_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Overrides the status of one pipeline task.
    #[must_use]
    pub const fn with_task_status(mut self, task_id: TaskId, status: TaskStatus) -> Self {
        self.task_status = Some(TaskStatusPatch { task_id, status });
        self
    }
}

/// Request payload for moving an issue to another status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionIssueStatusRequest {
    pub(crate) issue_id: IssueId,
    pub(crate) actor: PrincipalId,
    pub(crate) target: IssueStatus,
    pub(crate) comment: String,
}

impl TransitionIssueStatusRequest {
    /// Creates a transition of `issue_id` to `target` by `actor`.
    #[must_use]
    pub const fn new(issue_id: IssueId, actor: PrincipalId, target: IssueStatus) -> Self {
        Self {
            issue_id,
            actor,
            target,
            comment: String::new(),
        }
    }

    /// Sets the activity comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}
