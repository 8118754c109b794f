//! Shared world state for issue status transition BDD scenarios.

use std::{collections::HashMap, sync::Arc};

use issueflow::workflow::{
    adapters::memory::{InMemoryWorkflowStore, RecordingDelivery},
    domain::{
        Activity, ActivityType, ChangeList, DatabaseId, InstanceId, Issue, PrincipalId,
        ProjectId, TaskStatus,
    },
    ports::{RecordWrite, UnitOfWork, WorkflowStore},
    services::{IssueWorkflowError, IssueWorkflowService, TaskDefinition},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestWorkflowService =
    IssueWorkflowService<InMemoryWorkflowStore, RecordingDelivery, DefaultClock>;

/// Scenario world for issue transition behaviour tests.
pub struct IssueTransitionWorld {
    pub store: Arc<InMemoryWorkflowStore>,
    pub delivery: Arc<RecordingDelivery>,
    pub service: TestWorkflowService,
    pub project_id: ProjectId,
    pub principals: HashMap<String, PrincipalId>,
    pub issue: Option<Issue>,
    pub last_transition_result: Option<Result<Issue, IssueWorkflowError>>,
}

impl IssueTransitionWorld {
    /// Creates a world with an empty store and no issue.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let delivery = Arc::new(RecordingDelivery::new());
        let service = IssueWorkflowService::new(
            Arc::clone(&store),
            Arc::clone(&delivery),
            Arc::new(DefaultClock),
        );

        Self {
            store,
            delivery,
            service,
            project_id: ProjectId::new(),
            principals: HashMap::new(),
            issue: None,
            last_transition_result: None,
        }
    }

    /// Returns the principal known by `name`, creating it on first use.
    pub fn principal(&mut self, name: &str) -> PrincipalId {
        *self
            .principals
            .entry(name.to_owned())
            .or_insert_with(PrincipalId::new)
    }

    /// Returns the scenario issue.
    ///
    /// # Errors
    ///
    /// Returns an error when no issue was created yet.
    pub fn issue(&self) -> Result<&Issue, eyre::Report> {
        self.issue
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing issue in scenario world"))
    }

    /// Writes task and step statuses directly to the store, in pipeline
    /// order, the way an executor reporting progress would.
    ///
    /// # Errors
    ///
    /// Returns an error when the issue or its pipeline is missing or the
    /// commit fails.
    pub fn set_task_statuses(&self, statuses: &[TaskStatus]) -> Result<(), eyre::Report> {
        let clock = DefaultClock;
        let issue_id = self.issue()?.id();
        let stored = run_async(self.service.get_issue(issue_id))?;
        let snapshot = run_async(self.service.pipeline_snapshot(issue_id))?
            .ok_or_else(|| eyre::eyre!("scenario issue has no pipeline"))?;
        let actor = stored.creator();

        let mut tasks = Vec::new();
        let mut steps = Vec::new();
        for (entry, status) in snapshot.tasks.into_iter().zip(statuses) {
            let mut task = entry.task;
            task.set_status(*status, actor, &clock);
            tasks.push(RecordWrite::Update(task));
            for mut step in entry.steps {
                step.set_status(*status, actor, &clock);
                steps.push(RecordWrite::Update(step));
            }
        }

        let activity = Activity::record(
            stored.workspace_id(),
            stored.id(),
            ActivityType::IssueFieldUpdate,
            actor,
            "executor progress",
            ChangeList::new(),
            &clock,
        );
        let version = stored.version();
        run_async(
            self.store.commit(
                UnitOfWork::update(stored, version, activity)
                    .with_tasks(tasks)
                    .with_steps(steps),
            ),
        )?;
        Ok(())
    }
}

impl Default for IssueTransitionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> IssueTransitionWorld {
    IssueTransitionWorld::default()
}

/// Builds a general task definition with the given steps.
#[must_use]
pub fn rollout_task(name: &str, steps: &[&str]) -> TaskDefinition {
    TaskDefinition::new(name, "bb.task.general", InstanceId::new())
        .with_database(DatabaseId::new())
        .with_statement("UPDATE orders SET note = ''")
        .with_steps(steps.iter().copied())
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
