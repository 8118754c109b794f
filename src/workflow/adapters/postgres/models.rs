//! Diesel row models for workflow persistence and their domain mappings.

use super::schema::{
    issue_activities, issue_messages, issues, pipeline_tasks, pipelines, task_steps,
};
use crate::workflow::{
    domain::{
        Activity, ActivityId, ActivityType, AuditStamp, DatabaseId, EnvironmentId, InstanceId,
        Issue, IssueId, IssueStatus, Message, MessageId, MessageStatus, PersistedActivityData,
        PersistedIssueData, PersistedMessageData, PersistedStepData, PersistedTaskData, Pipeline,
        PipelineId, PipelineStatus, PrincipalId, ProjectId, Step, StepId, Task, TaskId,
        TaskStatus, TaskTarget, WorkspaceId,
    },
    ports::{WorkflowStoreError, WorkflowStoreResult},
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

fn to_json<T: serde::Serialize>(value: &T) -> WorkflowStoreResult<Value> {
    serde_json::to_value(value).map_err(WorkflowStoreError::persistence)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> WorkflowStoreResult<T> {
    serde_json::from_value(value).map_err(WorkflowStoreError::persistence)
}

fn to_position(position: u32) -> WorkflowStoreResult<i32> {
    i32::try_from(position).map_err(WorkflowStoreError::persistence)
}

fn from_position(position: i32) -> WorkflowStoreResult<u32> {
    u32::try_from(position).map_err(WorkflowStoreError::persistence)
}

pub(super) fn to_version(version: u64) -> WorkflowStoreResult<i64> {
    i64::try_from(version).map_err(WorkflowStoreError::persistence)
}

pub(super) fn from_version(version: i64) -> WorkflowStoreResult<u64> {
    u64::try_from(version).map_err(WorkflowStoreError::persistence)
}

const fn stamp_of(
    creator_id: Uuid,
    created_at: DateTime<Utc>,
    updater_id: Uuid,
    updated_at: DateTime<Utc>,
) -> AuditStamp {
    AuditStamp {
        creator: PrincipalId::from_uuid(creator_id),
        created_at,
        updater: PrincipalId::from_uuid(updater_id),
        updated_at,
    }
}

/// Issue row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = issues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct IssueRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub status: String,
    pub assignee_id: Option<Uuid>,
    pub subscriber_ids: Value,
    pub description: String,
    pub sql_statement: Option<String>,
    pub rollback_statement: Option<String>,
    pub pipeline_id: Option<Uuid>,
    pub payload: Value,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updater_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl IssueRecord {
    pub fn from_domain(issue: &Issue) -> WorkflowStoreResult<Self> {
        let stamp = issue.stamp();
        Ok(Self {
            id: issue.id().into_inner(),
            workspace_id: issue.workspace_id().into_inner(),
            project_id: issue.project_id().into_inner(),
            name: issue.name().to_owned(),
            status: issue.status().as_str().to_owned(),
            assignee_id: issue.assignee().map(PrincipalId::into_inner),
            subscriber_ids: to_json(&issue.subscribers())?,
            description: issue.description().to_owned(),
            sql_statement: issue.sql().map(str::to_owned),
            rollback_statement: issue.rollback_sql().map(str::to_owned),
            pipeline_id: issue.pipeline_id().map(PipelineId::into_inner),
            payload: to_json(issue.payload())?,
            creator_id: stamp.creator.into_inner(),
            created_at: stamp.created_at,
            updater_id: stamp.updater.into_inner(),
            updated_at: stamp.updated_at,
            version: to_version(issue.version())?,
        })
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Issue> {
        let status =
            IssueStatus::try_from(self.status.as_str()).map_err(WorkflowStoreError::persistence)?;
        Ok(Issue::from_persisted(PersistedIssueData {
            id: IssueId::from_uuid(self.id),
            workspace_id: WorkspaceId::from_uuid(self.workspace_id),
            project_id: ProjectId::from_uuid(self.project_id),
            name: self.name,
            status,
            assignee: self.assignee_id.map(PrincipalId::from_uuid),
            subscribers: from_json(self.subscriber_ids)?,
            description: self.description,
            sql: self.sql_statement,
            rollback_sql: self.rollback_statement,
            pipeline_id: self.pipeline_id.map(PipelineId::from_uuid),
            payload: from_json(self.payload)?,
            stamp: stamp_of(
                self.creator_id,
                self.created_at,
                self.updater_id,
                self.updated_at,
            ),
            version: from_version(self.version)?,
        }))
    }
}

/// Pipeline row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = pipelines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PipelineRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub status: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updater_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    pub fn from_domain(pipeline: &Pipeline) -> Self {
        let stamp = pipeline.stamp();
        Self {
            id: pipeline.id().into_inner(),
            workspace_id: pipeline.workspace_id().into_inner(),
            name: pipeline.name().to_owned(),
            status: pipeline.status().as_str().to_owned(),
            creator_id: stamp.creator.into_inner(),
            created_at: stamp.created_at,
            updater_id: stamp.updater.into_inner(),
            updated_at: stamp.updated_at,
        }
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Pipeline> {
        let status = PipelineStatus::try_from(self.status.as_str())
            .map_err(WorkflowStoreError::persistence)?;
        Ok(Pipeline::from_persisted(
            PipelineId::from_uuid(self.id),
            WorkspaceId::from_uuid(self.workspace_id),
            self.name,
            status,
            stamp_of(
                self.creator_id,
                self.created_at,
                self.updater_id,
                self.updated_at,
            ),
        ))
    }
}

/// Pipeline task row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = pipeline_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub position: i32,
    pub name: String,
    pub status: String,
    pub task_type: String,
    pub instance_id: Uuid,
    pub database_id: Option<Uuid>,
    pub environment_id: Option<Uuid>,
    pub payload: Value,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updater_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn from_domain(task: &Task) -> WorkflowStoreResult<Self> {
        let stamp = task.stamp();
        let target = task.target();
        Ok(Self {
            id: task.id().into_inner(),
            pipeline_id: task.pipeline_id().into_inner(),
            position: to_position(task.position())?,
            name: task.name().to_owned(),
            status: task.status().as_str().to_owned(),
            task_type: task.task_type().as_str().to_owned(),
            instance_id: target.instance_id.into_inner(),
            database_id: target.database_id.map(DatabaseId::into_inner),
            environment_id: target.environment_id.map(EnvironmentId::into_inner),
            payload: to_json(task.payload())?,
            creator_id: stamp.creator.into_inner(),
            created_at: stamp.created_at,
            updater_id: stamp.updater.into_inner(),
            updated_at: stamp.updated_at,
        })
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Task> {
        let status =
            TaskStatus::try_from(self.status.as_str()).map_err(WorkflowStoreError::persistence)?;
        Ok(Task::from_persisted(PersistedTaskData {
            id: TaskId::from_uuid(self.id),
            pipeline_id: PipelineId::from_uuid(self.pipeline_id),
            position: from_position(self.position)?,
            name: self.name,
            status,
            target: TaskTarget {
                instance_id: InstanceId::from_uuid(self.instance_id),
                database_id: self.database_id.map(DatabaseId::from_uuid),
                environment_id: self.environment_id.map(EnvironmentId::from_uuid),
            },
            payload: from_json(self.payload)?,
            stamp: stamp_of(
                self.creator_id,
                self.created_at,
                self.updater_id,
                self.updated_at,
            ),
        }))
    }
}

/// Task step row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = task_steps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StepRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub pipeline_id: Uuid,
    pub issue_id: Uuid,
    pub position: i32,
    pub name: String,
    pub status: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updater_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn from_domain(step: &Step) -> WorkflowStoreResult<Self> {
        let stamp = step.stamp();
        Ok(Self {
            id: step.id().into_inner(),
            task_id: step.task_id().into_inner(),
            pipeline_id: step.pipeline_id().into_inner(),
            issue_id: step.issue_id().into_inner(),
            position: to_position(step.position())?,
            name: step.name().to_owned(),
            status: step.status().as_str().to_owned(),
            creator_id: stamp.creator.into_inner(),
            created_at: stamp.created_at,
            updater_id: stamp.updater.into_inner(),
            updated_at: stamp.updated_at,
        })
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Step> {
        let status =
            TaskStatus::try_from(self.status.as_str()).map_err(WorkflowStoreError::persistence)?;
        Ok(Step::from_persisted(PersistedStepData {
            id: StepId::from_uuid(self.id),
            task_id: TaskId::from_uuid(self.task_id),
            pipeline_id: PipelineId::from_uuid(self.pipeline_id),
            issue_id: IssueId::from_uuid(self.issue_id),
            position: from_position(self.position)?,
            name: self.name,
            status,
            stamp: stamp_of(
                self.creator_id,
                self.created_at,
                self.updater_id,
                self.updated_at,
            ),
        }))
    }
}

/// Activity row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = issue_activities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActivityRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub container_id: Uuid,
    pub action_type: String,
    pub actor_id: Uuid,
    pub comment: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn from_domain(activity: &Activity) -> WorkflowStoreResult<Self> {
        Ok(Self {
            id: activity.id().into_inner(),
            workspace_id: activity.workspace_id().into_inner(),
            container_id: activity.container_id().into_inner(),
            action_type: activity.action().as_str().to_owned(),
            actor_id: activity.actor().into_inner(),
            comment: activity.comment().to_owned(),
            payload: to_json(activity.payload())?,
            created_at: activity.created_at(),
        })
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Activity> {
        let action = ActivityType::try_from(self.action_type.as_str())
            .map_err(WorkflowStoreError::persistence)?;
        Ok(Activity::from_persisted(PersistedActivityData {
            id: ActivityId::from_uuid(self.id),
            workspace_id: WorkspaceId::from_uuid(self.workspace_id),
            container_id: IssueId::from_uuid(self.container_id),
            action,
            actor: PrincipalId::from_uuid(self.actor_id),
            comment: self.comment,
            payload: from_json(self.payload)?,
            created_at: self.created_at,
        }))
    }
}

/// Message row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = issue_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub container_id: Uuid,
    pub actor_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub message_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn from_domain(message: &Message) -> WorkflowStoreResult<Self> {
        Ok(Self {
            id: message.id().into_inner(),
            workspace_id: message.workspace_id().into_inner(),
            container_id: message.container_id().into_inner(),
            actor_id: message.actor().into_inner(),
            receiver_id: message.receiver().into_inner(),
            status: message.status().as_str().to_owned(),
            message_type: message.message_type().as_str().to_owned(),
            payload: to_json(message.payload())?,
            created_at: message.created_at(),
        })
    }

    pub fn into_domain(self) -> WorkflowStoreResult<Message> {
        let status = MessageStatus::try_from(self.status.as_str())
            .map_err(WorkflowStoreError::persistence)?;
        Ok(Message::from_persisted(PersistedMessageData {
            id: MessageId::from_uuid(self.id),
            workspace_id: WorkspaceId::from_uuid(self.workspace_id),
            container_id: IssueId::from_uuid(self.container_id),
            actor: PrincipalId::from_uuid(self.actor_id),
            receiver: PrincipalId::from_uuid(self.receiver_id),
            status,
            payload: from_json(self.payload)?,
            created_at: self.created_at,
        }))
    }
}
