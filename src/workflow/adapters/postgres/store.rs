//! `PostgreSQL` workflow store.

use super::{
    models::{
        ActivityRecord, IssueRecord, MessageRecord, PipelineRecord, StepRecord, TaskRecord,
        from_version, to_version,
    },
    schema::{issue_activities, issue_messages, issues, pipeline_tasks, pipelines, task_steps},
};
use crate::workflow::{
    domain::{
        Activity, Issue, IssueId, Message, PipelineId, PipelineSnapshot, PrincipalId, Step,
        TaskWithSteps, WorkspaceId,
    },
    ports::{
        IssueFilter, IssueWrite, RecordWrite, UnitOfWork, WorkflowStore, WorkflowStoreError,
        WorkflowStoreResult,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use uuid::Uuid;

/// `PostgreSQL` connection pool type used by workflow adapters.
pub type WorkflowPgPool = Pool<ConnectionManager<PgConnection>>;

impl From<DieselError> for WorkflowStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `PostgreSQL`-backed workflow store.
///
/// Each unit of work runs in one transaction. Issue updates are guarded by
/// `WHERE version = expected`, so a concurrent writer rolls the whole unit
/// back with [`WorkflowStoreError::VersionConflict`].
#[derive(Debug, Clone)]
pub struct PostgresWorkflowStore {
    pool: WorkflowPgPool,
}

impl PostgresWorkflowStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: WorkflowPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> WorkflowStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WorkflowStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkflowStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WorkflowStoreError::persistence)?
    }
}

fn map_insert_error(err: DieselError, entity: &'static str, id: Uuid) -> WorkflowStoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            WorkflowStoreError::duplicate(entity, id)
        }
        other => WorkflowStoreError::persistence(other),
    }
}

const fn ensure_updated(rows: usize, entity: &'static str, id: Uuid) -> WorkflowStoreResult<()> {
    if rows == 0 {
        return Err(WorkflowStoreError::missing(entity, id));
    }
    Ok(())
}

fn write_issue(connection: &mut PgConnection, write: &IssueWrite) -> WorkflowStoreResult<()> {
    match write {
        IssueWrite::Insert(issue) => {
            let record = IssueRecord::from_domain(issue)?;
            diesel::insert_into(issues::table)
                .values(&record)
                .execute(connection)
                .map_err(|err| map_insert_error(err, "issue", record.id))?;
        }
        IssueWrite::Update {
            issue,
            expected_version,
        } => {
            let record = IssueRecord::from_domain(issue)?;
            let rows = diesel::update(
                issues::table
                    .filter(issues::id.eq(record.id))
                    .filter(issues::version.eq(to_version(*expected_version)?)),
            )
            .set(&record)
            .execute(connection)?;
            if rows == 0 {
                let found = issues::table
                    .filter(issues::id.eq(record.id))
                    .select(issues::version)
                    .first::<i64>(connection)
                    .optional()?;
                return Err(match found {
                    Some(version) => WorkflowStoreError::VersionConflict {
                        issue_id: issue.id(),
                        expected: *expected_version,
                        found: from_version(version)?,
                    },
                    None => WorkflowStoreError::missing("issue", record.id),
                });
            }
        }
    }
    Ok(())
}

fn write_unit(connection: &mut PgConnection, work: &UnitOfWork) -> WorkflowStoreResult<()> {
    // Pipeline and tasks go first so the issue and steps can reference them.
    if let Some(write) = &work.pipeline {
        let record = PipelineRecord::from_domain(write.record());
        match write {
            RecordWrite::Insert(_) => {
                diesel::insert_into(pipelines::table)
                    .values(&record)
                    .execute(connection)
                    .map_err(|err| map_insert_error(err, "pipeline", record.id))?;
            }
            RecordWrite::Update(_) => {
                let rows = diesel::update(pipelines::table.find(record.id))
                    .set(&record)
                    .execute(connection)?;
                ensure_updated(rows, "pipeline", record.id)?;
            }
        }
    }

    for write in &work.tasks {
        let record = TaskRecord::from_domain(write.record())?;
        match write {
            RecordWrite::Insert(_) => {
                diesel::insert_into(pipeline_tasks::table)
                    .values(&record)
                    .execute(connection)
                    .map_err(|err| map_insert_error(err, "task", record.id))?;
            }
            RecordWrite::Update(_) => {
                let rows = diesel::update(pipeline_tasks::table.find(record.id))
                    .set(&record)
                    .execute(connection)?;
                ensure_updated(rows, "task", record.id)?;
            }
        }
    }

    write_issue(connection, &work.issue)?;

    for write in &work.steps {
        let record = StepRecord::from_domain(write.record())?;
        match write {
            RecordWrite::Insert(_) => {
                diesel::insert_into(task_steps::table)
                    .values(&record)
                    .execute(connection)
                    .map_err(|err| map_insert_error(err, "step", record.id))?;
            }
            RecordWrite::Update(_) => {
                let rows = diesel::update(task_steps::table.find(record.id))
                    .set(&record)
                    .execute(connection)?;
                ensure_updated(rows, "step", record.id)?;
            }
        }
    }

    let activity = ActivityRecord::from_domain(&work.activity)?;
    diesel::insert_into(issue_activities::table)
        .values(&activity)
        .execute(connection)
        .map_err(|err| map_insert_error(err, "activity", activity.id))?;

    let messages = work
        .messages
        .iter()
        .map(MessageRecord::from_domain)
        .collect::<WorkflowStoreResult<Vec<_>>>()?;
    if !messages.is_empty() {
        diesel::insert_into(issue_messages::table)
            .values(&messages)
            .execute(connection)?;
    }
    Ok(())
}

fn load_snapshot(
    connection: &mut PgConnection,
    record: PipelineRecord,
) -> WorkflowStoreResult<PipelineSnapshot> {
    let pipeline = record.into_domain()?;
    let task_rows = pipeline_tasks::table
        .filter(pipeline_tasks::pipeline_id.eq(pipeline.id().into_inner()))
        .order(pipeline_tasks::position.asc())
        .select(TaskRecord::as_select())
        .load::<TaskRecord>(connection)?;
    let step_rows = task_steps::table
        .filter(task_steps::pipeline_id.eq(pipeline.id().into_inner()))
        .order((task_steps::task_id.asc(), task_steps::position.asc()))
        .select(StepRecord::as_select())
        .load::<StepRecord>(connection)?;

    let steps = step_rows
        .into_iter()
        .map(StepRecord::into_domain)
        .collect::<WorkflowStoreResult<Vec<Step>>>()?;

    let tasks = task_rows
        .into_iter()
        .map(|row| {
            let task = row.into_domain()?;
            let owned_steps = steps
                .iter()
                .filter(|step| step.task_id() == task.id())
                .cloned()
                .collect();
            Ok(TaskWithSteps {
                task,
                steps: owned_steps,
            })
        })
        .collect::<WorkflowStoreResult<Vec<_>>>()?;

    Ok(PipelineSnapshot { pipeline, tasks })
}

#[async_trait]
impl WorkflowStore for PostgresWorkflowStore {
    async fn find_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Option<Issue>> {
        self.run_blocking(move |connection| {
            let row = issues::table
                .filter(issues::id.eq(issue_id.into_inner()))
                .filter(issues::workspace_id.eq(workspace_id.into_inner()))
                .select(IssueRecord::as_select())
                .first::<IssueRecord>(connection)
                .optional()?;
            row.map(IssueRecord::into_domain).transpose()
        })
        .await
    }

    async fn list_issues(
        &self,
        workspace_id: WorkspaceId,
        filter: IssueFilter,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        self.run_blocking(move |connection| {
            let mut query = issues::table
                .filter(issues::workspace_id.eq(workspace_id.into_inner()))
                .select(IssueRecord::as_select())
                .into_boxed();
            if let Some(project) = filter.project {
                query = query.filter(issues::project_id.eq(project.into_inner()));
            }
            if let Some(principal) = filter.principal {
                let subscribed = json!([principal]);
                query = query.filter(
                    issues::creator_id
                        .eq(principal.into_inner())
                        .or(issues::assignee_id.eq(principal.into_inner()))
                        .or(issues::subscriber_ids.contains(subscribed)),
                );
            }
            query
                .order((issues::created_at.asc(), issues::id.asc()))
                .load::<IssueRecord>(connection)?
                .into_iter()
                .map(IssueRecord::into_domain)
                .collect()
        })
        .await
    }

    async fn find_pipeline(
        &self,
        workspace_id: WorkspaceId,
        pipeline_id: PipelineId,
    ) -> WorkflowStoreResult<Option<PipelineSnapshot>> {
        self.run_blocking(move |connection| {
            let row = pipelines::table
                .filter(pipelines::id.eq(pipeline_id.into_inner()))
                .filter(pipelines::workspace_id.eq(workspace_id.into_inner()))
                .select(PipelineRecord::as_select())
                .first::<PipelineRecord>(connection)
                .optional()?;
            row.map(|record| load_snapshot(connection, record))
                .transpose()
        })
        .await
    }

    async fn activities_for_issue(
        &self,
        workspace_id: WorkspaceId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Activity>> {
        self.run_blocking(move |connection| {
            issue_activities::table
                .filter(issue_activities::workspace_id.eq(workspace_id.into_inner()))
                .filter(issue_activities::container_id.eq(issue_id.into_inner()))
                .order((
                    issue_activities::created_at.asc(),
                    issue_activities::id.asc(),
                ))
                .select(ActivityRecord::as_select())
                .load::<ActivityRecord>(connection)?
                .into_iter()
                .map(ActivityRecord::into_domain)
                .collect()
        })
        .await
    }

    async fn messages_for_receiver(
        &self,
        workspace_id: WorkspaceId,
        receiver: PrincipalId,
    ) -> WorkflowStoreResult<Vec<Message>> {
        self.run_blocking(move |connection| {
            issue_messages::table
                .filter(issue_messages::workspace_id.eq(workspace_id.into_inner()))
                .filter(issue_messages::receiver_id.eq(receiver.into_inner()))
                .order((issue_messages::created_at.asc(), issue_messages::id.asc()))
                .select(MessageRecord::as_select())
                .load::<MessageRecord>(connection)?
                .into_iter()
                .map(MessageRecord::into_domain)
                .collect()
        })
        .await
    }

    async fn commit(&self, work: UnitOfWork) -> WorkflowStoreResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| write_unit(tx, &work))
        })
        .await
    }
}
