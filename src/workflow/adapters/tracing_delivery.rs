//! Delivery adapter that emits each message as a structured log event.

use tracing::info;

use crate::workflow::{domain::Message, ports::MessageDelivery};

/// Logs messages instead of sending them anywhere.
///
/// Useful as a default when no notification subsystem is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDelivery;

impl MessageDelivery for TracingDelivery {
    fn deliver(&self, message: &Message) {
        info!(
            message_id = %message.id(),
            issue_id = %message.container_id(),
            receiver = %message.receiver(),
            message_type = message.message_type().as_str(),
            "issue notification delivered"
        );
    }
}
