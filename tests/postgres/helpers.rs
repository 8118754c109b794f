//! Shared helpers for `PostgreSQL` workflow store integration tests.

use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use issueflow::workflow::{
    adapters::{
        memory::RecordingDelivery,
        postgres::{PostgresWorkflowStore, WorkflowPgPool},
    },
    domain::{DatabaseId, InstanceId, Issue, PrincipalId, ProjectId, TaskType, WorkspaceId},
    services::{
        CreateIssueRequest, IssueWorkflowService, PipelineDefinition, TaskDefinition,
        WorkflowConfig,
    },
};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::TestCluster;
use pg_embedded_setup_unpriv::test_support::shared_test_cluster;
use rstest::fixture;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// SQL creating the workflow tables.
pub const CREATE_WORKFLOW_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_workflow_tables/up.sql");

/// Template database name for the pre-migrated schema.
pub const TEMPLATE_DB: &str = "issueflow_test_template";

/// Service type used by the `PostgreSQL` integration tests.
pub type PgService = IssueWorkflowService<PostgresWorkflowStore, RecordingDelivery, DefaultClock>;

/// Creates a runtime for driving the async store from synchronous tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn test_runtime() -> Result<Runtime, eyre::Report> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Ensures the template database exists with the workflow schema applied.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub fn ensure_template(cluster: &TestCluster) -> Result<(), eyre::Report> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            conn.batch_execute(CREATE_WORKFLOW_TABLES_SQL)
                .map_err(|e| eyre::eyre!("{e}"))?;
            Ok(())
        })
        .map_err(|err| eyre::eyre!("template setup failed: {err}"))
}

/// Database cloned from the template and dropped with the guard.
pub struct TemporaryDatabase {
    cluster: &'static TestCluster,
    name: String,
}

impl TemporaryDatabase {
    /// Creates a fresh database from [`TEMPLATE_DB`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn from_template(cluster: &'static TestCluster) -> Result<Self, eyre::Report> {
        let name = format!("workflow_{}", Uuid::new_v4().simple());
        cluster
            .create_database_from_template(name.as_str(), TEMPLATE_DB)
            .map_err(|err| eyre::eyre!("database creation failed: {err}"))?;
        Ok(Self { cluster, name })
    }

    /// Returns a connection URL for the database.
    #[must_use]
    pub fn url(&self) -> String {
        self.cluster.connection().database_url(&self.name)
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(self.name.as_str()));
    }
}

/// Service wired to a `PostgreSQL` store in its own database.
///
/// Fields drop in declaration order, so the pool closes before the
/// database is dropped.
pub struct PgSetup {
    pub store: Arc<PostgresWorkflowStore>,
    pub delivery: Arc<RecordingDelivery>,
    pub service: PgService,
    pub workspace_id: WorkspaceId,
    pub runtime: Runtime,
    _database: TemporaryDatabase,
}

/// Provides a migrated database and a service over it for each test.
///
/// # Errors
///
/// Returns an error if the template, database, pool or runtime cannot be
/// prepared.
#[fixture]
pub fn pg_setup(shared_test_cluster: &'static TestCluster) -> Result<PgSetup, eyre::Report> {
    ensure_template(shared_test_cluster)?;
    let database = TemporaryDatabase::from_template(shared_test_cluster)?;
    let manager = ConnectionManager::<PgConnection>::new(database.url());
    let pool: WorkflowPgPool = Pool::builder().max_size(2).build(manager)?;

    let workspace_id = WorkspaceId::new();
    let store = Arc::new(PostgresWorkflowStore::new(pool));
    let delivery = Arc::new(RecordingDelivery::new());
    let config = WorkflowConfig::new(workspace_id).with_payload_field("env")?;
    let service = IssueWorkflowService::new(
        Arc::clone(&store),
        Arc::clone(&delivery),
        Arc::new(DefaultClock),
    )
    .with_config(config);
    Ok(PgSetup {
        store,
        delivery,
        service,
        workspace_id,
        runtime: test_runtime()?,
        _database: database,
    })
}

fn schema_task(name: &str, steps: &[&str]) -> TaskDefinition {
    TaskDefinition::new(name, TaskType::SchemaUpdate.as_str(), InstanceId::new())
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
pub fn create_rollout_issue(
    setup: &PgSetup,
    project_id: ProjectId,
    creator: PrincipalId,
) -> Result<Issue, eyre::Report> {
    let pipeline = PipelineDefinition::new("Rollout")
        .with_task(schema_task("staging", &["plan", "apply"]))
        .with_task(schema_task("production", &["apply"]));
    let issue = setup.runtime.block_on(
        setup.service.create_issue(
            CreateIssueRequest::new(project_id, "Add order note", creator).with_pipeline(pipeline),
        ),
    )?;
    Ok(issue)
}
