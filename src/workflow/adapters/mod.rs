//! Adapter implementations of the workflow ports.

pub mod memory;
pub mod postgres;
mod tracing_delivery;

pub use tracing_delivery::TracingDelivery;
