//! `PostgreSQL` adapters for issue workflow persistence.

pub(crate) mod models;
mod schema;
mod store;

pub use store::{PostgresWorkflowStore, WorkflowPgPool};
