//! Shared test helpers for in-memory issue workflow integration tests.

use std::sync::Arc;

use issueflow::workflow::{
    adapters::memory::{InMemoryWorkflowStore, RecordingDelivery},
    domain::{
        Activity, ActivityType, ChangeList, DatabaseId, InstanceId, Issue, PrincipalId,
        ProjectId, TaskStatus, WorkspaceId,
    },
    ports::{RecordWrite, UnitOfWork, WorkflowStore},
    services::{
        CreateIssueRequest, IssueWorkflowService, PipelineDefinition, TaskDefinition,
        WorkflowConfig,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the integration tests.
pub type TestService = IssueWorkflowService<InMemoryWorkflowStore, RecordingDelivery, DefaultClock>;

/// Service wired to an in-memory store and a recording delivery.
pub struct Setup {
    pub store: Arc<InMemoryWorkflowStore>,
    pub delivery: Arc<RecordingDelivery>,
    pub service: TestService,
}

/// Builds a service over `store` scoped to `workspace_id`.
///
/// # Errors
///
/// Returns an error if the payload field declaration is rejected.
pub fn service_for(
    store: &Arc<InMemoryWorkflowStore>,
    workspace_id: WorkspaceId,
) -> Result<(TestService, Arc<RecordingDelivery>), eyre::Report> {
    let delivery = Arc::new(RecordingDelivery::new());
    let config = WorkflowConfig::new(workspace_id).with_payload_field("env")?;
    let service = IssueWorkflowService::new(
        Arc::clone(store),
        Arc::clone(&delivery),
        Arc::new(DefaultClock),
    )
    .with_config(config);
    Ok((service, delivery))
}

/// Provides a fresh service for each test.
///
/// # Errors
///
/// Returns an error if the service configuration is rejected.
#[fixture]
pub fn setup() -> Result<Setup, eyre::Report> {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let (service, delivery) = service_for(&store, WorkspaceId::new())?;
    Ok(Setup {
        store,
        delivery,
        service,
    })
}

/// Builds a schema-update task definition with the given steps.
#[must_use]
pub fn schema_task(name: &str, steps: &[&str]) -> TaskDefinition {
    TaskDefinition::new(name, "bb.task.database.schema.update", InstanceId::new())
        .with_database(DatabaseId::new())
        .with_statement("ALTER TABLE orders ADD COLUMN note TEXT")
        .with_rollback_statement("ALTER TABLE orders DROP COLUMN note")
        .with_steps(steps.iter().copied())
}

/// Opens an issue backed by a two-environment rollout pipeline.
///
/// # Errors
///
/// Returns an error if issue creation fails.
pub async fn create_rollout_issue(
    service: &TestService,
    project_id: ProjectId,
    creator: PrincipalId,
) -> Result<Issue, eyre::Report> {
    let pipeline = PipelineDefinition::new("Rollout")
        .with_task(schema_task("staging", &["plan", "apply"]))
        .with_task(schema_task("production", &["apply"]));
    let issue = service
        .create_issue(
            CreateIssueRequest::new(project_id, "Add order note", creator).with_pipeline(pipeline),
        )
        .await?;
    Ok(issue)
}

/// Sets every task of the issue's pipeline, and its steps, to the given
/// statuses in pipeline order, bypassing the workflow service.
///
/// # Errors
///
/// Returns an error if the issue has no pipeline or the commit fails.
pub async fn set_task_statuses(
    setup: &Setup,
    issue: &Issue,
    statuses: &[TaskStatus],
) -> Result<(), eyre::Report> {
    let clock = DefaultClock;
    let actor = issue.creator();
    let snapshot = setup
        .service
        .pipeline_snapshot(issue.id())
        .await?
        .ok_or_else(|| eyre::eyre!("issue has no pipeline"))?;
    let stored = setup.service.get_issue(issue.id()).await?;

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
    setup
        .store
        .commit(
            UnitOfWork::update(stored, version, activity)
                .with_tasks(tasks)
                .with_steps(steps),
        )
        .await?;
    Ok(())
}
