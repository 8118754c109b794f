//! Append-only audit records and notification messages.

use super::{
    ActivityId, ChangeList, IssueId, IssueStatus, MessageId, ParseStatusError, PrincipalId,
    WorkspaceId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of action an activity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    /// An issue was opened.
    #[serde(rename = "issue.create")]
    IssueCreate,
    /// Issue fields were edited.
    #[serde(rename = "issue.field.update")]
    IssueFieldUpdate,
    /// The issue status changed.
    #[serde(rename = "issue.status.update")]
    IssueStatusUpdate,
}

impl ActivityType {
    /// Returns the canonical action identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IssueCreate => "issue.create",
            Self::IssueFieldUpdate => "issue.field.update",
            Self::IssueStatusUpdate => "issue.status.update",
        }
    }
}

impl TryFrom<&str> for ActivityType {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "issue.create" => Ok(Self::IssueCreate),
            "issue.field.update" => Ok(Self::IssueFieldUpdate),
            "issue.status.update" => Ok(Self::IssueStatusUpdate),
            _ => Err(ParseStatusError::new("activity type", value)),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured activity payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// Field-level changes.
    pub change_list: ChangeList,
}

/// Parameter object for reconstructing a persisted activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedActivityData {
    /// Persisted identifier.
    pub id: ActivityId,
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Issue the activity belongs to.
    pub container_id: IssueId,
    /// Action kind.
    pub action: ActivityType,
    /// Principal that acted.
    pub actor: PrincipalId,
    /// Free-form comment.
    pub comment: String,
    /// Structured payload.
    pub payload: ActivityPayload,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Immutable audit-log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    id: ActivityId,
    workspace_id: WorkspaceId,
    container_id: IssueId,
    action: ActivityType,
    actor: PrincipalId,
    comment: String,
    payload: ActivityPayload,
    created_at: DateTime<Utc>,
}

impl Activity {
    /// Records an action on `container_id`.
    #[must_use]
    pub fn record(
        workspace_id: WorkspaceId,
        container_id: IssueId,
        action: ActivityType,
        actor: PrincipalId,
        comment: impl Into<String>,
        change_list: ChangeList,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            workspace_id,
            container_id,
            action,
            actor,
            comment: comment.into(),
            payload: ActivityPayload { change_list },
            created_at: clock.utc(),
        }
    }

    /// Reconstructs an activity from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedActivityData) -> Self {
        Self {
            id: data.id,
            workspace_id: data.workspace_id,
            container_id: data.container_id,
            action: data.action,
            actor: data.actor,
            comment: data.comment,
            payload: data.payload,
            created_at: data.created_at,
        }
    }

    /// Returns the activity identifier.
    #[must_use]
    pub const fn id(&self) -> ActivityId {
        self.id
    }

    /// Returns the workspace scope.
    #[must_use]
    pub const fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the issue this activity belongs to.
    #[must_use]
    pub const fn container_id(&self) -> IssueId {
        self.container_id
    }

    /// Returns the action kind.
    #[must_use]
    pub const fn action(&self) -> ActivityType {
        self.action
    }

    /// Returns the acting principal.
    #[must_use]
    pub const fn actor(&self) -> PrincipalId {
        self.actor
    }

    /// Returns the comment.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns the structured payload.
    #[must_use]
    pub const fn payload(&self) -> &ActivityPayload {
        &self.payload
    }

    /// Returns the recorded changes.
    #[must_use]
    pub const fn change_list(&self) -> &ChangeList {
        &self.payload.change_list
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Handed to the receiver's inbox.
    Delivered,
    /// Read by the receiver.
    Consumed,
}

impl MessageStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "DELIVERED",
            Self::Consumed => "CONSUMED",
        }
    }
}

impl TryFrom<&str> for MessageStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DELIVERED" => Ok(Self::Delivered),
            "CONSUMED" => Ok(Self::Consumed),
            _ => Err(ParseStatusError::new("message", value)),
        }
    }
}

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// The issue assignee changed.
    #[serde(rename = "issue.assign")]
    IssueAssign,
    /// The issue status changed.
    #[serde(rename = "issue.status.update")]
    IssueStatusUpdate,
}

impl MessageType {
    /// Returns the canonical message type identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IssueAssign => "issue.assign",
            Self::IssueStatusUpdate => "issue.status.update",
        }
    }
}

/// Type-specific message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessagePayload {
    /// Payload of [`MessageType::IssueAssign`].
    #[serde(rename = "issue.assign")]
    Assign {
        /// Name of the issue.
        issue_name: String,
        /// Assignee before the change.
        old_assignee: Option<PrincipalId>,
        /// Assignee after the change.
        new_assignee: PrincipalId,
    },
    /// Payload of [`MessageType::IssueStatusUpdate`].
    #[serde(rename = "issue.status.update")]
    StatusUpdate {
        /// Name of the issue.
        issue_name: String,
        /// Status before the change.
        old_status: IssueStatus,
        /// Status after the change.
        new_status: IssueStatus,
    },
}

impl MessagePayload {
    /// Returns the message type implied by the payload shape.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Assign { .. } => MessageType::IssueAssign,
            Self::StatusUpdate { .. } => MessageType::IssueStatusUpdate,
        }
    }
}

/// Parameter object for reconstructing a persisted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMessageData {
    /// Persisted identifier.
    pub id: MessageId,
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Issue the message refers to.
    pub container_id: IssueId,
    /// Principal that triggered the message.
    pub actor: PrincipalId,
    /// Receiving principal.
    pub receiver: PrincipalId,
    /// Delivery status.
    pub status: MessageStatus,
    /// Typed payload.
    pub payload: MessagePayload,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A notification addressed to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    workspace_id: WorkspaceId,
    container_id: IssueId,
    actor: PrincipalId,
    receiver: PrincipalId,
    status: MessageStatus,
    payload: MessagePayload,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Reconstructs a message from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMessageData) -> Self {
        Self {
            id: data.id,
            workspace_id: data.workspace_id,
            container_id: data.container_id,
            actor: data.actor,
            receiver: data.receiver,
            status: data.status,
            payload: data.payload,
            created_at: data.created_at,
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the workspace scope.
    #[must_use]
    pub const fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Returns the issue the message refers to.
    #[must_use]
    pub const fn container_id(&self) -> IssueId {
        self.container_id
    }

    /// Returns the principal that triggered the message.
    #[must_use]
    pub const fn actor(&self) -> PrincipalId {
        self.actor
    }

    /// Returns the receiving principal.
    #[must_use]
    pub const fn receiver(&self) -> PrincipalId {
        self.receiver
    }

    /// Returns the delivery status.
    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    /// Returns the message type.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    /// Returns the typed payload.
    #[must_use]
    pub const fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Message fields shared by every receiver of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    /// Workspace scope.
    pub workspace_id: WorkspaceId,
    /// Issue the message refers to.
    pub container_id: IssueId,
    /// Principal that triggered the message.
    pub actor: PrincipalId,
    /// Typed payload.
    pub payload: MessagePayload,
}

impl MessageTemplate {
    /// Creates one delivered message per receiver.
    #[must_use]
    pub fn address(&self, receivers: &[PrincipalId], clock: &impl Clock) -> Vec<Message> {
        let created_at = clock.utc();
        receivers
            .iter()
            .map(|receiver| Message {
                id: MessageId::new(),
                workspace_id: self.workspace_id,
                container_id: self.container_id,
                actor: self.actor,
                receiver: *receiver,
                status: MessageStatus::Delivered,
                payload: self.payload.clone(),
                created_at,
            })
            .collect()
    }
}
