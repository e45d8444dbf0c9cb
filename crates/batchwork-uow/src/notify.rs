//! Notification sinks for failures that are reported rather than returned.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives user-facing failure messages from commit and cascade setup.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Logs every message at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str) {
        tracing::error!(target: "batchwork::notification", "{message}");
    }
}

/// Keeps messages in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        CollectingSink::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

impl fmt::Debug for CollectingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectingSink")
            .field("messages", &self.messages())
            .finish()
    }
}
