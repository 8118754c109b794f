//! Issue workflow orchestration: creation, field patches and status
//! transitions, each committed as one unit of work.

use super::{
    config::WorkflowConfig,
    requests::{
        CreateIssueRequest, PatchIssueRequest, PipelineDefinition, TaskStatusPatch,
        TransitionIssueStatusRequest,
    },
};
use crate::workflow::{
    domain::{
        Activity, ActivityType, ChangeList, FieldId, Issue, IssueDraft, IssueField,
        IssueFieldUpdate, IssueId, IssuePayload, Message, MessagePayload, MessageTemplate,
        PayloadKey, Pipeline, PipelineId, PipelineSnapshot, PrincipalId, ResolutionConflict,
        Step, Task, TaskId, WorkflowDomainError, notification_receivers, plan_transition,
    },
    ports::{
        EntityRef, IssueFilter, MessageDelivery, RecordWrite, ReferenceDirectory, UnitOfWork,
        WorkflowStore, WorkflowStoreError,
    },
};
use mockable::Clock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Transport-neutral classification of workflow failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced record does not exist.
    NotFound,
    /// The request conflicts with the current state.
    Conflict,
    /// The request is malformed.
    Validation,
    /// Persistence failed.
    Internal,
}

/// Service-level errors for issue workflow operations.
#[derive(Debug, Error)]
pub enum IssueWorkflowError {
    /// The issue does not exist in the workspace.
    #[error("issue not found: {0}")]
    IssueNotFound(IssueId),

    /// The task is not part of the issue's pipeline.
    #[error("task {task_id} not found in the pipeline of issue {issue_id}")]
    TaskNotFound {
        /// Issue whose pipeline was searched.
        issue_id: IssueId,
        /// Requested task.
        task_id: TaskId,
    },

    /// The issue references a pipeline the store cannot resolve.
    #[error("pipeline not found: {0}")]
    PipelineNotFound(PipelineId),

    /// A creation request references a record the directory cannot resolve.
    #[error("{0} not found")]
    ReferenceNotFound(EntityRef),

    /// The issue cannot resolve while its pipeline has unfinished work.
    #[error(transparent)]
    UnresolvedWork(#[from] ResolutionConflict),

    /// Domain validation failed.
    #[error(transparent)]
    Validation(#[from] WorkflowDomainError),

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
}

impl IssueWorkflowError {
    /// Classifies the error for the transport layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::IssueNotFound(_)
            | Self::TaskNotFound { .. }
            | Self::PipelineNotFound(_)
            | Self::ReferenceNotFound(_) => ErrorKind::NotFound,
            Self::UnresolvedWork(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(store) => match store {
                WorkflowStoreError::DuplicateRecord { .. }
                | WorkflowStoreError::VersionConflict { .. } => ErrorKind::Conflict,
                WorkflowStoreError::MissingRecord { .. } => ErrorKind::NotFound,
                WorkflowStoreError::Persistence(_) => ErrorKind::Internal,
            },
        }
    }
}

/// Records of a pipeline about to be created with its issue.
struct PlannedPipeline {
    pipeline: Pipeline,
    tasks: Vec<Task>,
    steps: Vec<Step>,
}

/// Result type for issue workflow service operations.
pub type IssueWorkflowResult<T> = Result<T, IssueWorkflowError>;

/// Issue workflow orchestration service.
///
/// Every mutating operation reads the issue, computes all record writes
/// without side effects, commits them as one [`UnitOfWork`] and only then
/// hands the committed messages to [`MessageDelivery`].
#[derive(Clone)]
pub struct IssueWorkflowService<S, D, C>
where
    S: WorkflowStore,
    D: MessageDelivery,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    delivery: Arc<D>,
    clock: Arc<C>,
    config: WorkflowConfig,
    directory: Option<Arc<dyn ReferenceDirectory>>,
}

impl<S, D, C> IssueWorkflowService<S, D, C>
where
    S: WorkflowStore,
    D: MessageDelivery,
    C: Clock + Send + Sync,
{
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, delivery: Arc<D>, clock: Arc<C>) -> Self {
        Self {
            store,
            delivery,
            clock,
            config: WorkflowConfig::default(),
            directory: None,
        }
    }

    /// Replaces the service configuration.
    #[must_use]
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolves the references of creation requests against `directory`.
    ///
    /// Without a directory, project, principal and target ids are taken as
    /// given.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn ReferenceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Opens an issue, optionally with its pipeline, tasks and steps.
    ///
    /// Tasks and steps are created `PENDING` in the given order. One
    /// `issue.create` activity is written and nobody is notified.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::Validation`] for a blank name, an
    /// unknown task type, a task missing a required field or an undeclared
    /// payload field. Returns [`IssueWorkflowError::ReferenceNotFound`] when
    /// a configured directory cannot resolve the project, a principal or a
    /// task target. Returns [`IssueWorkflowError::Store`] when a lookup or
    /// the commit fails.
    #[instrument(skip_all, fields(project_id = %request.project_id, creator = %request.creator))]
    pub async fn create_issue(&self, request: CreateIssueRequest) -> IssueWorkflowResult<Issue> {
        let clock = &*self.clock;
        let workspace_id = self.config.workspace_id;
        let creator = request.creator;
        let references = request.references();
        let payload: IssuePayload = self
            .resolve_payload(request.payload)?
            .into_iter()
            .collect();

        let issue_id = IssueId::new();
        let planned = request
            .pipeline
            .as_ref()
            .map(|definition| self.plan_pipeline(definition, issue_id, creator))
            .transpose()?;

        let draft = IssueDraft {
            workspace_id,
            project_id: request.project_id,
            name: request.name,
            creator,
            assignee: request.assignee,
            description: request.description,
            sql: request.sql,
            rollback_sql: request.rollback_sql,
            payload,
        };
        let pipeline_id = planned.as_ref().map(|plan| plan.pipeline.id());
        let issue = Issue::open(issue_id, draft, pipeline_id, clock)?;
        self.resolve_references(references).await?;
        let activity = Activity::record(
            workspace_id,
            issue.id(),
            ActivityType::IssueCreate,
            creator,
            "",
            ChangeList::new(),
            clock,
        );

        let mut work = UnitOfWork::create(issue.clone(), activity);
        let mut task_count = 0;
        if let Some(plan) = planned {
            task_count = plan.tasks.len();
            work = work
                .with_pipeline(RecordWrite::Insert(plan.pipeline))
                .with_tasks(plan.tasks.into_iter().map(RecordWrite::Insert))
                .with_steps(plan.steps.into_iter().map(RecordWrite::Insert));
        }
        self.commit(work).await?;

        info!(
            issue_id = %issue.id(),
            pipeline_id = ?issue.pipeline_id(),
            task_count,
            "issue created"
        );
        Ok(issue)
    }

    /// Applies a partial field update to an issue.
    ///
    /// Fields equal to their current value are ignored. When nothing
    /// differs the issue is returned unchanged and nothing is written.
    /// Otherwise the issue, any task status override, one
    /// `issue.field.update` activity and the assignment notifications are
    /// committed together.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::IssueNotFound`] for an unknown issue,
    /// [`IssueWorkflowError::TaskNotFound`] when the task override names a
    /// task outside the issue's pipeline, [`IssueWorkflowError::Validation`]
    /// for an undeclared payload field, and [`IssueWorkflowError::Store`]
    /// when the commit fails or races another writer.
    #[instrument(skip_all, fields(issue_id = %request.issue_id, actor = %request.actor))]
    pub async fn patch_issue(&self, request: PatchIssueRequest) -> IssueWorkflowResult<Issue> {
        let clock = &*self.clock;
        let actor = request.actor;
        let mut issue = self.load_issue(request.issue_id).await?;
        let expected_version = issue.version();
        let previous_assignee = issue.assignee();
        let payload = self.resolve_payload(request.payload)?;

        let mut changes = ChangeList::new();
        issue.apply_fields(
            IssueFieldUpdate {
                assignee: request.assignee,
                description: request.description,
                subscribers: request.subscribers,
                sql: request.sql,
                rollback_sql: request.rollback_sql,
                payload,
            },
            &mut changes,
        );
        let task_write = match request.task_status {
            Some(patch) => self.override_task_status(&issue, patch, actor, &mut changes).await?,
            None => None,
        };

        if changes.is_empty() {
            debug!("patch left every field unchanged");
            return Ok(issue);
        }

        let messages = match issue.assignee() {
            Some(new_assignee)
                if changes
                    .find(&FieldId::Builtin(IssueField::Assignee))
                    .is_some() =>
            {
                let receivers = notification_receivers(
                    issue.creator(),
                    previous_assignee,
                    Some(new_assignee),
                    actor,
                );
                MessageTemplate {
                    workspace_id: issue.workspace_id(),
                    container_id: issue.id(),
                    actor,
                    payload: MessagePayload::Assign {
                        issue_name: issue.name().to_owned(),
                        old_assignee: previous_assignee,
                        new_assignee,
                    },
                }
                .address(&receivers, clock)
            }
            _ => Vec::new(),
        };

        issue.record_update(actor, clock);
        let change_count = changes.len();
        let activity = Activity::record(
            issue.workspace_id(),
            issue.id(),
            ActivityType::IssueFieldUpdate,
            actor,
            request.comment,
            changes,
            clock,
        );
        let work = UnitOfWork::update(issue.clone(), expected_version, activity)
            .with_tasks(task_write)
            .with_messages(messages.clone());
        self.commit(work).await?;
        self.deliver_all(&messages);

        info!(
            change_count,
            message_count = messages.len(),
            "issue fields updated"
        );
        Ok(issue)
    }

    /// Moves an issue to another status and propagates the change to its
    /// pipeline.
    ///
    /// Moving to the current status is a no-op. The pipeline plan is
    /// computed before anything changes, so a rejected resolution leaves
    /// every record untouched.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::IssueNotFound`] for an unknown issue,
    /// [`IssueWorkflowError::UnresolvedWork`] when resolving an issue whose
    /// pipeline has unfinished tasks or steps, and
    /// [`IssueWorkflowError::Store`] when the commit fails or races another
    /// writer.
    #[instrument(
        skip_all,
        fields(issue_id = %request.issue_id, actor = %request.actor, target = %request.target)
    )]
    pub async fn transition_status(
        &self,
        request: TransitionIssueStatusRequest,
    ) -> IssueWorkflowResult<Issue> {
        let clock = &*self.clock;
        let actor = request.actor;
        let target = request.target;
        let mut issue = self.load_issue(request.issue_id).await?;
        let previous_status = issue.status();
        if previous_status == target {
            debug!("issue already in target status");
            return Ok(issue);
        }

        let applied = match issue.pipeline_id() {
            Some(pipeline_id) => {
                let snapshot = self.load_pipeline(pipeline_id).await?;
                let plan = plan_transition(issue.name(), &snapshot, target).inspect_err(
                    |conflict| {
                        warn!(
                            violation_count = conflict.violations.len(),
                            "issue resolution rejected"
                        );
                    },
                )?;
                Some(plan.apply(snapshot, actor, clock))
            }
            None => None,
        };

        let expected_version = issue.version();
        let mut changes = ChangeList::new();
        issue.apply_status(target, &mut changes);
        issue.record_update(actor, clock);

        let receivers =
            notification_receivers(issue.creator(), issue.assignee(), issue.assignee(), actor);
        let messages = MessageTemplate {
            workspace_id: issue.workspace_id(),
            container_id: issue.id(),
            actor,
            payload: MessagePayload::StatusUpdate {
                issue_name: issue.name().to_owned(),
                old_status: previous_status,
                new_status: target,
            },
        }
        .address(&receivers, clock);

        let activity = Activity::record(
            issue.workspace_id(),
            issue.id(),
            ActivityType::IssueStatusUpdate,
            actor,
            request.comment,
            changes,
            clock,
        );
        let mut work = UnitOfWork::update(issue.clone(), expected_version, activity)
            .with_messages(messages.clone());
        let mut canceled_tasks = 0;
        if let Some(transition) = applied {
            canceled_tasks = transition.tasks.len();
            work = work
                .with_pipeline(RecordWrite::Update(transition.pipeline))
                .with_tasks(transition.tasks.into_iter().map(RecordWrite::Update))
                .with_steps(transition.steps.into_iter().map(RecordWrite::Update));
        }
        self.commit(work).await?;
        self.deliver_all(&messages);

        info!(
            from = %previous_status,
            to = %target,
            canceled_tasks,
            message_count = messages.len(),
            "issue status updated"
        );
        Ok(issue)
    }

    /// Retrieves one issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::IssueNotFound`] when the issue does not
    /// exist in the workspace, or [`IssueWorkflowError::Store`] when the
    /// lookup fails.
    pub async fn get_issue(&self, issue_id: IssueId) -> IssueWorkflowResult<Issue> {
        self.load_issue(issue_id).await
    }

    /// Lists the workspace's issues passing `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::Store`] when the lookup fails.
    pub async fn list_issues(&self, filter: IssueFilter) -> IssueWorkflowResult<Vec<Issue>> {
        Ok(self
            .store
            .list_issues(self.config.workspace_id, filter)
            .await?)
    }

    /// Returns the audit trail of an issue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::IssueNotFound`] for an unknown issue, or
    /// [`IssueWorkflowError::Store`] when the lookup fails.
    pub async fn issue_activities(&self, issue_id: IssueId) -> IssueWorkflowResult<Vec<Activity>> {
        let issue = self.load_issue(issue_id).await?;
        Ok(self
            .store
            .activities_for_issue(issue.workspace_id(), issue.id())
            .await?)
    }

    /// Returns the messages addressed to `receiver`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::Store`] when the lookup fails.
    pub async fn inbox(&self, receiver: PrincipalId) -> IssueWorkflowResult<Vec<Message>> {
        Ok(self
            .store
            .messages_for_receiver(self.config.workspace_id, receiver)
            .await?)
    }

    /// Returns the pipeline backing an issue with its tasks and steps.
    ///
    /// Returns `Ok(None)` when the issue was created without a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`IssueWorkflowError::IssueNotFound`] for an unknown issue,
    /// [`IssueWorkflowError::PipelineNotFound`] when the referenced pipeline
    /// is missing, or [`IssueWorkflowError::Store`] when the lookup fails.
    pub async fn pipeline_snapshot(
        &self,
        issue_id: IssueId,
    ) -> IssueWorkflowResult<Option<PipelineSnapshot>> {
        let issue = self.load_issue(issue_id).await?;
        match issue.pipeline_id() {
            Some(pipeline_id) => Ok(Some(self.load_pipeline(pipeline_id).await?)),
            None => Ok(None),
        }
    }

    fn plan_pipeline(
        &self,
        definition: &PipelineDefinition,
        issue_id: IssueId,
        creator: PrincipalId,
    ) -> Result<PlannedPipeline, WorkflowDomainError> {
        let clock = &*self.clock;
        let pipeline = Pipeline::new(self.config.workspace_id, definition.name(), creator, clock);
        let mut tasks = Vec::with_capacity(definition.tasks().len());
        let mut steps = Vec::new();
        for (position, task_definition) in (0_u32..).zip(definition.tasks()) {
            let task = Task::new(
                pipeline.id(),
                position,
                task_definition.name(),
                task_definition.target(),
                task_definition.payload()?,
                creator,
                clock,
            );
            steps.extend(
                (0_u32..)
                    .zip(task_definition.steps())
                    .map(|(step_position, name)| {
                        Step::new(&task, issue_id, step_position, name.as_str(), creator, clock)
                    }),
            );
            tasks.push(task);
        }
        Ok(PlannedPipeline {
            pipeline,
            tasks,
            steps,
        })
    }

    async fn load_issue(&self, issue_id: IssueId) -> IssueWorkflowResult<Issue> {
        self.store
            .find_issue(self.config.workspace_id, issue_id)
            .await?
            .ok_or(IssueWorkflowError::IssueNotFound(issue_id))
    }

    async fn load_pipeline(
        &self,
        pipeline_id: PipelineId,
    ) -> IssueWorkflowResult<PipelineSnapshot> {
        self.store
            .find_pipeline(self.config.workspace_id, pipeline_id)
            .await?
            .ok_or(IssueWorkflowError::PipelineNotFound(pipeline_id))
    }

    async fn resolve_references(&self, references: Vec<EntityRef>) -> IssueWorkflowResult<()> {
        let Some(directory) = &self.directory else {
            return Ok(());
        };
        for reference in references {
            if !directory
                .contains(self.config.workspace_id, reference)
                .await?
            {
                warn!(%reference, "creation references an unknown record");
                return Err(IssueWorkflowError::ReferenceNotFound(reference));
            }
        }
        Ok(())
    }

    async fn override_task_status(
        &self,
        issue: &Issue,
        patch: TaskStatusPatch,
        actor: PrincipalId,
        changes: &mut ChangeList,
    ) -> IssueWorkflowResult<Option<RecordWrite<Task>>> {
        let not_found = IssueWorkflowError::TaskNotFound {
            issue_id: issue.id(),
            task_id: patch.task_id,
        };
        let Some(pipeline_id) = issue.pipeline_id() else {
            return Err(not_found);
        };
        let snapshot = self.load_pipeline(pipeline_id).await?;
        let Some(current) = snapshot.task(patch.task_id) else {
            return Err(not_found);
        };

        let mut task = current.clone();
        if !changes.record(FieldId::Task(task.id()), task.status(), patch.status) {
            return Ok(None);
        }
        task.set_status(patch.status, actor, &*self.clock);
        Ok(Some(RecordWrite::Update(task)))
    }

    fn resolve_payload(
        &self,
        raw: BTreeMap<String, Value>,
    ) -> Result<BTreeMap<PayloadKey, Value>, WorkflowDomainError> {
        raw.into_iter()
            .map(|(key, value)| Ok((self.config.payload_key(&key)?, value)))
            .collect()
    }

    async fn commit(&self, work: UnitOfWork) -> IssueWorkflowResult<()> {
        self.store.commit(work).await.map_err(|err| {
            if matches!(err, WorkflowStoreError::VersionConflict { .. }) {
                warn!(error = %err, "issue modified concurrently");
            }
            IssueWorkflowError::from(err)
        })
    }

    fn deliver_all(&self, messages: &[Message]) {
        for message in messages {
            self.delivery.deliver(message);
        }
    }
}
