//! Error types for workflow domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing workflow domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowDomainError {
    /// The issue name is empty after trimming.
    #[error("issue name must not be empty")]
    EmptyIssueName,

    /// The task type string is not one of the supported task types.
    #[error("unrecognized task type: {0}")]
    UnknownTaskType(String),

    /// A task definition lacks a field its task type requires.
    #[error("task type {task_type} requires field '{field}'")]
    MissingTaskField {
        /// The declared task type.
        task_type: &'static str,
        /// The missing field.
        field: &'static str,
    },

    /// A payload key is malformed or outside the configured key domain.
    #[error("unknown issue payload field: {0}")]
    UnknownPayloadField(String),

    /// A field identifier string could not be parsed.
    #[error("invalid field identifier: {0}")]
    InvalidFieldId(String),
}

/// Error returned while parsing a status from persistence or user input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {entity} status: {value}")]
pub struct ParseStatusError {
    /// Entity kind whose status failed to parse.
    pub entity: &'static str,
    /// The rejected raw value.
    pub value: String,
}

impl ParseStatusError {
    pub(crate) fn new(entity: &'static str, value: &str) -> Self {
        Self {
            entity,
            value: value.to_owned(),
        }
    }
}
