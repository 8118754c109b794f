//! Application services for the issue workflow.

mod config;
mod requests;
mod workflow;

pub use config::WorkflowConfig;
pub use requests::{
    CreateIssueRequest, PatchIssueRequest, PipelineDefinition, TaskDefinition, TaskStatusPatch,
    TransitionIssueStatusRequest,
};
pub use workflow::{ErrorKind, IssueWorkflowError, IssueWorkflowResult, IssueWorkflowService};
