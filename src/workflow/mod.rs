//! Issue workflow engine.
//!
//! Owns the lifecycle of an issue and the pipeline of tasks and steps
//! backing it: status transitions with their pipeline side effects,
//! field-level audit records and notification fan-out. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
