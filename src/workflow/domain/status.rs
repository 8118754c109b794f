//! Status enums for issues, pipelines, tasks and steps.
//!
//! Issue and pipeline statuses overlap only partially, so they are kept as
//! separate enums and related through [`PipelineStatus::on_issue_transition`]
//! instead of sharing status strings.

use super::ParseStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    /// The issue is being worked on.
    Open,
    /// The issue has been resolved.
    Done,
    /// The issue has been abandoned.
    Canceled,
}

impl IssueStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }
}

impl TryFrom<&str> for IssueStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "DONE" => Ok(Self::Done),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(ParseStatusError::new("issue", value)),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    /// Execution is parked until the user resumes it.
    Pending,
    /// Execution is in progress.
    Open,
    /// Every task has finished.
    Done,
    /// The owning issue was canceled.
    Canceled,
}

impl PipelineStatus {
    /// Status assigned to a pipeline created together with its issue.
    pub const ON_CREATION: Self = Self::Open;

    /// Maps an issue status transition onto the pipeline status it implies.
    ///
    /// | issue      | pipeline   |
    /// |------------|------------|
    /// | `OPEN`     | `PENDING`  |
    /// | `DONE`     | `DONE`     |
    /// | `CANCELED` | `CANCELED` |
    #[must_use]
    pub const fn on_issue_transition(target: IssueStatus) -> Self {
        match target {
            IssueStatus::Open => Self::Pending,
            IssueStatus::Done => Self::Done,
            IssueStatus::Canceled => Self::Canceled,
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Open => "OPEN",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }
}

impl TryFrom<&str> for PipelineStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "OPEN" => Ok(Self::Open),
            "DONE" => Ok(Self::Done),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(ParseStatusError::new("pipeline", value)),
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status shared by tasks and steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting to be scheduled.
    Pending,
    /// Waiting for an approver.
    PendingApproval,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Canceled,
    /// Deliberately not executed.
    Skipped,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Returns whether this status allows the owning issue to resolve.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Skipped)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(ParseStatusError::new("task", value)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
