//! Issueflow: issue workflow engine for database change management.
//!
//! An issue is a requested database change. It is backed by a pipeline of
//! ordered tasks, each split into steps. This crate enforces the issue's
//! status transitions and their effect on the pipeline, records every
//! field-level change as an activity, and notifies the principals an
//! update concerns.
//!
//! # Architecture
//!
//! Issueflow follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and delivery
//! - **Adapters**: In-memory, `PostgreSQL` and logging implementations
//!
//! # Modules
//!
//! - [`workflow`]: Issue, pipeline, task and step lifecycle

pub mod workflow;
