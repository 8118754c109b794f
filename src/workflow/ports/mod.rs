//! Port contracts for the issue workflow.
//!
//! Ports define infrastructure-agnostic interfaces used by workflow services.

pub mod delivery;
pub mod directory;
pub mod store;

pub use delivery::MessageDelivery;
pub use directory::{EntityRef, ReferenceDirectory};
pub use store::{
    IssueFilter, IssueWrite, RecordWrite, UnitOfWork, WorkflowStore, WorkflowStoreError,
    WorkflowStoreResult,
};
