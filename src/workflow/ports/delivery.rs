//! Notification delivery port.

use crate::workflow::domain::Message;

/// Hands committed messages to the notification subsystem.
///
/// Delivery is fire-and-forget: implementations own their failure handling
/// and the workflow never retries.
#[cfg_attr(test, mockall::automock)]
pub trait MessageDelivery: Send + Sync {
    /// Delivers one message to its receiver.
    fn deliver(&self, message: &Message);
}
