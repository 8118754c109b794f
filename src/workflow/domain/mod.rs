//! Domain model for the issue workflow.
//!
//! Issues, their pipelines, tasks and steps, and the audit and notification
//! records derived from changing them. Everything here is free of
//! infrastructure; status transitions are planned as pure functions.

mod activity;
mod error;
mod fanout;
mod field;
mod ids;
mod issue;
mod pipeline;
mod status;
mod transition;

pub use activity::{
    Activity, ActivityPayload, ActivityType, Message, MessagePayload, MessageStatus,
    MessageTemplate, MessageType, PersistedActivityData, PersistedMessageData,
};
pub use error::{ParseStatusError, WorkflowDomainError};
pub use fanout::notification_receivers;
pub use field::{
    ChangeList, FieldChange, FieldId, IntoFieldValue, IssueField, IssuePayload, PayloadKey,
};
pub use ids::{
    ActivityId, DatabaseId, EnvironmentId, InstanceId, IssueId, MessageId, PipelineId,
    PrincipalId, ProjectId, StepId, TaskId, WorkspaceId,
};
pub use issue::{Issue, IssueDraft, IssueFieldUpdate, PersistedIssueData};
pub use pipeline::{
    AuditStamp, PersistedStepData, PersistedTaskData, Pipeline, PipelineSnapshot, Step, Task,
    TaskPayload, TaskTarget, TaskType, TaskWithSteps,
};
pub use status::{IssueStatus, PipelineStatus, TaskStatus};
pub use transition::{
    AppliedTransition, ResolutionConflict, ResolutionViolation, TransitionPlan, plan_transition,
    resolution_violations,
};
