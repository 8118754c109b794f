//! In-memory message delivery that records what it was handed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::workflow::{domain::Message, ports::MessageDelivery};

/// Delivery adapter keeping every delivered message in memory.
///
/// A panic while the log is held does not lose later deliveries: the log
/// is recovered from a poisoned lock and keeps recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelivery {
    delivered: Arc<Mutex<Vec<Message>>>,
}

impl RecordingDelivery {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages delivered so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Message> {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Message>> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageDelivery for RecordingDelivery {
    fn deliver(&self, message: &Message) {
        self.log().push(message.clone());
    }
}
