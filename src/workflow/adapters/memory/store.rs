//! In-memory workflow store for tests and embedded use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::workflow::{
    domain::{
        Activity, Issue, IssueId, Message, Pipeline, PipelineId, PipelineSnapshot, PrincipalId,
        Step, StepId, Task, TaskId, TaskWithSteps, WorkspaceId,
    },
    ports::{
        IssueFilter, IssueWrite, RecordWrite, UnitOfWork, WorkflowStore, WorkflowStoreError,
        WorkflowStoreResult,
    },
};

/// Thread-safe in-memory workflow store.
///
/// A unit of work is checked in full and then applied under one write
/// guard, so readers never observe a partial commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    state: Arc<RwLock<InMemoryWorkflowState>>,
}

#[derive(Debug, Default)]
struct InMemoryWorkflowState {
    issues: HashMap<IssueId, Issue>,
    issue_order: Vec<IssueId>,
    pipelines: HashMap<PipelineId, Pipeline>,
    tasks: HashMap<TaskId, Task>,
    steps: HashMap<StepId, Step>,
    activities: Vec<Activity>,
    messages: Vec<Message>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> WorkflowStoreResult<RwLockReadGuard<'_, InMemoryWorkflowState>> {
        self.state.read().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> WorkflowStoreResult<RwLockWriteGuard<'_, InMemoryWorkflowState>> {
        self.state.write().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

/// Checks an insert-or-update against the records currently stored.
fn check_write<K, T>(
    records: &HashMap<K, T>,
    write: &RecordWrite<T>,
    key: impl Fn(&T) -> K,
    entity: &'static str,
) -> WorkflowStoreResult<()>
where
    K: std::hash::Hash + Eq + AsRef<uuid::Uuid>,
{
    let id = key(write.record());
    match (write, records.contains_key(&id)) {
        (RecordWrite::Insert(_), true) => Err(WorkflowStoreError::duplicate(entity, *id.as_ref())),
        (RecordWrite::Update(_), false) => Err(WorkflowStoreError::missing(entity, *id.as_ref())),
        _ => Ok(()),
    }
}

fn apply_write<K, T>(records: &mut HashMap<K, T>, write: RecordWrite<T>, key: impl Fn(&T) -> K)
where
    K: std::hash::Hash + Eq,
{
    let (RecordWrite::Insert(record) | RecordWrite::Update(record)) = write;
    records.insert(key(&record), record);
}

impl InMemoryWorkflowState {
    fn check(&self, work: &UnitOfWork) -> WorkflowStoreResult<()> {
        match &work.issue {
            IssueWrite::Insert(issue) => {
                if self.issues.contains_key(&issue.id()) {
                    return Err(WorkflowStoreError::duplicate("issue", issue.id().into_inner()));
                }
            }
            IssueWrite::Update {
                issue,
                expected_version,
            } => {
                let stored = self
                    .issues
                    .get(&issue.id())
                    .ok_or_else(|| WorkflowStoreError::missing("issue", issue.id().into_inner()))?;
                if stored.version() != *expected_version {
                    return Err(WorkflowStoreError::VersionConflict {
                        issue_id: issue.id(),
                        expected: *expected_version,
                        found: stored.version(),
                    });
                }
            }
        }

        if let Some(pipeline) = &work.pipeline {
            check_write(&self.pipelines, pipeline, Pipeline::id, "pipeline")?;
        }
        for task in &work.tasks {
            check_write(&self.tasks, task, Task::id, "task")?;
        }
        for step in &work.steps {
            check_write(&self.steps, step, Step::id, "step")?;
        }
        if self
            .activities
            .iter()
            .any(|activity| activity.id() == work.activity.id())
        {
            return Err(WorkflowStoreError::duplicate(
                "activity",
                work.activity.id().into_inner(),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, work: UnitOfWork) {
        let UnitOfWork {
            issue,
            pipeline,
            tasks,
            steps,
            activity,
            messages,
        } = work;

        let (IssueWrite::Insert(record) | IssueWrite::Update { issue: record, .. }) = issue;
        if !self.issues.contains_key(&record.id()) {
            self.issue_order.push(record.id());
        }
        self.issues.insert(record.id(), record);

        if let Some(write) = pipeline {
            apply_write(&mut self.pipelines, write, Pipeline::id);
        }
        for write in tasks {
            apply_write(&mut self.tasks, write, Task::id);
        }
        for write in steps {
            apply_write(&mut self.steps, write, Step::id);
        }
        self.activities.push(activity);
        self.messages.extend(messages);
    }

    fn snapshot(&self, pipeline: &Pipeline) -> PipelineSnapshot {
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| task.pipeline_id() == pipeline.id())
            .collect();
        tasks.sort_by_key(|task| task.position());

        let entries = tasks
            .into_iter()
            .map(|task| {
                let mut steps: Vec<Step> = self
                    .steps
                    .values()
                    .filter(|step| step.task_id() == task.id())
                    .cloned()
                    .collect();
                steps.sort_by_key(Step::position);
                TaskWithSteps {
                    task: task.clone(),
                    steps,
                }
            })
            .collect();

        PipelineSnapshot {
            pipeline: pipeline.clone(),
            tasks: entries,
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn find_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Option<Issue>> {
        let state = self.read()?;
        Ok(state
            .issues
            .get(&issue_id)
            .filter(|issue| issue.workspace_id() == workspace_id)
            .cloned())
    }

    async fn list_issues(
        &self,
        workspace_id: WorkspaceId,
        filter: IssueFilter,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        let state = self.read()?;
        Ok(state
            .issue_order
            .iter()
            .filter_map(|id| state.issues.get(id))
            .filter(|issue| issue.workspace_id() == workspace_id && filter.matches(issue))
            .cloned()
            .collect())
    }

    async fn find_pipeline(
        &self,
        workspace_id: WorkspaceId,
        pipeline_id: PipelineId,
    ) -> WorkflowStoreResult<Option<PipelineSnapshot>> {
        let state = self.read()?;
        Ok(state
            .pipelines
            .get(&pipeline_id)
            .filter(|pipeline| pipeline.workspace_id() == workspace_id)
            .map(|pipeline| state.snapshot(pipeline)))
    }

    async fn activities_for_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Activity>> {
        let state = self.read()?;
        Ok(state
            .activities
            .iter()
            .filter(|activity| {
                activity.workspace_id() == workspace_id && activity.container_id() == issue_id
            })
            .cloned()
            .collect())
    }

    async fn messages_for_receiver(
        &self,
        workspace_id: WorkspaceId,
        receiver: PrincipalId,
    ) -> WorkflowStoreResult<Vec<Message>> {
        let state = self.read()?;
        Ok(state
            .messages
            .iter()
            .filter(|message| {
                message.workspace_id() == workspace_id && message.receiver() == receiver
            })
            .cloned()
            .collect())
    }

    async fn commit(&self, work: UnitOfWork) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        state.check(&work)?;
        state.apply(work);
        Ok(())
    }
}
