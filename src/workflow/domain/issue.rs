//! Issue aggregate root.

use super::{
    AuditStamp, ChangeList, FieldId, IssueField, IssueId, IssuePayload, IssueStatus, PayloadKey,
    PipelineId, PrincipalId, ProjectId, WorkflowDomainError, WorkspaceId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Validated attributes of an issue about to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    /// Workspace scoping the issue.
    pub workspace_id: WorkspaceId,
    /// Project the issue belongs to.
    pub project_id: ProjectId,
    /// Issue name.
    pub name: String,
    /// Principal opening the issue.
    pub creator: PrincipalId,
    /// Initial assignee.
    pub assignee: Option<PrincipalId>,
    /// Free-text description.
    pub description: String,
    /// Forward SQL statement.
    pub sql: Option<String>,
    /// Rollback SQL statement.
    pub rollback_sql: Option<String>,
    /// Initial extra fields.
    pub payload: IssuePayload,
}

/// Parameter object for reconstructing a persisted issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedIssueData {
    /// Persisted identifier.
    pub id: IssueId,
    /// Workspace scoping the issue.
    pub workspace_id: WorkspaceId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Issue name.
    pub name: String,
    /// Issue status.
    pub status: IssueStatus,
    /// Current assignee.
    pub assignee: Option<PrincipalId>,
    /// Subscribers.
    pub subscribers: Vec<PrincipalId>,
    /// Description.
    pub description: String,
    /// Forward SQL statement.
    pub sql: Option<String>,
    /// Rollback SQL statement.
    pub rollback_sql: Option<String>,
    /// Backing pipeline.
    pub pipeline_id: Option<PipelineId>,
    /// Extra fields.
    pub payload: IssuePayload,
    /// Bookkeeping.
    pub stamp: AuditStamp,
    /// Optimistic concurrency version.
    pub version: u64,
}

/// Field updates requested by an issue patch.
///
/// `None` means "leave unchanged"; an empty description is a valid value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFieldUpdate {
    /// New assignee.
    pub assignee: Option<PrincipalId>,
    /// New description.
    pub description: Option<String>,
    /// New subscriber list.
    pub subscribers: Option<Vec<PrincipalId>>,
    /// New forward SQL.
    pub sql: Option<String>,
    /// New rollback SQL.
    pub rollback_sql: Option<String>,
    /// Extra payload fields to set; `null` clears a field.
    pub payload: BTreeMap<PayloadKey, Value>,
}

/// A unit of requested database change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    id: IssueId,
    workspace_id: WorkspaceId,
    project_id: ProjectId,
    name: String,
    status: IssueStatus,
    assignee: Option<PrincipalId>,
    subscribers: Vec<PrincipalId>,
    description: String,
    sql: Option<String>,
    rollback_sql: Option<String>,
    pipeline_id: Option<PipelineId>,
    payload: IssuePayload,
    stamp: AuditStamp,
    version: u64,
}

impl Issue {
    /// Opens a new issue from a draft.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::EmptyIssueName`] if the name is blank.
    pub fn open(
        id: IssueId,
        draft: IssueDraft,
        pipeline_id: Option<PipelineId>,
        clock: &impl Clock,
    ) -> Result<Self, WorkflowDomainError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(WorkflowDomainError::EmptyIssueName);
        }

        Ok(Self {
            id,
            workspace_id: draft.workspace_id,
            project_id: draft.project_id,
            name: name.to_owned(),
            status: IssueStatus::Open,
            assignee: draft.assignee,
            subscribers: Vec::new(),
            description: draft.description,
            sql: draft.sql,
            rollback_sql: draft.rollback_sql,
            pipeline_id,
            payload: draft.payload,
            stamp: AuditStamp::created_by(draft.creator, clock),
            version: 0,
        })
    }

    /// Reconstructs an issue from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedIssueData) -> Self {
        Self {
            id: data.id,
            workspace_id: data.workspace_id,
            project_id: data.project_id,
            name: data.name,
            status: data.status,
            assignee: data.assignee,
            subscribers: data.subscribers,
            description: data.description,
            sql: data.sql,
            rollback_sql: data.rollback_sql,
            pipeline_id: data.pipeline_id,
            payload: data.payload,
            stamp: data.stamp,
            version: data.version,
        }
    }

    /// Returns the issue identifier.
    #[must_use]
    pub const fn id(&self) -> IssueId {
        self.id
    }

    /// Returns the workspace scoping the issue.
    #[must_use]
    pub const fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the issue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the issue status.
    #[must_use]
    pub const fn status(&self) -> IssueStatus {
        self.status
    }

    /// Returns the current assignee, if any.
    #[must_use]
    pub const fn assignee(&self) -> Option<PrincipalId> {
        self.assignee
    }

    /// Returns the subscriber list.
    #[must_use]
    pub fn subscribers(&self) -> &[PrincipalId] {
        &self.subscribers
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the forward SQL statement.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Returns the rollback SQL statement.
    #[must_use]
    pub fn rollback_sql(&self) -> Option<&str> {
        self.rollback_sql.as_deref()
    }

    /// Returns the backing pipeline, if any.
    #[must_use]
    pub const fn pipeline_id(&self) -> Option<PipelineId> {
        self.pipeline_id
    }

    /// Returns the extra payload fields.
    #[must_use]
    pub const fn payload(&self) -> &IssuePayload {
        &self.payload
    }

    /// Returns creator and update bookkeeping.
    #[must_use]
    pub const fn stamp(&self) -> &AuditStamp {
        &self.stamp
    }

    /// Returns the creator.
    #[must_use]
    pub const fn creator(&self) -> PrincipalId {
        self.stamp.creator
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.stamp.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.stamp.updated_at
    }

    /// Returns the optimistic concurrency version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns whether `principal` created, is assigned to, or subscribes
    /// to this issue.
    #[must_use]
    pub fn involves(&self, principal: PrincipalId) -> bool {
        self.creator() == principal
            || self.assignee == Some(principal)
            || self.subscribers.contains(&principal)
    }

    /// Applies field updates, recording one change per differing field.
    pub fn apply_fields(&mut self, update: IssueFieldUpdate, changes: &mut ChangeList) {
        if let Some(assignee) = update.assignee {
            changes.record(
                FieldId::Builtin(IssueField::Assignee),
                self.assignee,
                Some(assignee),
            );
            self.assignee = Some(assignee);
        }
        if let Some(description) = update.description {
            changes.record(
                FieldId::Builtin(IssueField::Description),
                self.description.clone(),
                description.clone(),
            );
            self.description = description;
        }
        if let Some(subscribers) = update.subscribers {
            changes.record(
                FieldId::Builtin(IssueField::SubscriberList),
                self.subscribers.clone(),
                subscribers.clone(),
            );
            self.subscribers = subscribers;
        }
        if let Some(sql) = update.sql {
            changes.record(
                FieldId::Builtin(IssueField::Sql),
                self.sql.clone(),
                Some(sql.clone()),
            );
            self.sql = Some(sql);
        }
        if let Some(rollback_sql) = update.rollback_sql {
            changes.record(
                FieldId::Builtin(IssueField::RollbackSql),
                self.rollback_sql.clone(),
                Some(rollback_sql.clone()),
            );
            self.rollback_sql = Some(rollback_sql);
        }
        if !update.payload.is_empty() {
            self.payload.apply_updates(update.payload, changes);
        }
    }

    /// Moves the issue to `target`, recording the change.
    pub fn apply_status(&mut self, target: IssueStatus, changes: &mut ChangeList) {
        changes.record(FieldId::Builtin(IssueField::Status), self.status, target);
        self.status = target;
    }

    /// Stamps an update by `actor` and bumps the concurrency version.
    pub fn record_update(&mut self, actor: PrincipalId, clock: &impl Clock) {
        self.stamp.touch(actor, clock);
        self.version = self.version.saturating_add(1);
    }
}
