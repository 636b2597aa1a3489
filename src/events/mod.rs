//! Event types for document synchronization.
//!
//! `SyncEvent` is the inbound side: discrete document and runtime events
//! delivered by the host, consumed serially by the engine. `Notification`
//! is the outbound side: derived-state changes broadcast toward the
//! editing surface.

mod notification;
mod sync;

pub use notification::*;
pub use sync::*;

use crate::model::NodeId;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Notification message containing document and node context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Document ID that generated this notification.
    pub doc_id: String,
    /// Node ID the notification refers to (empty for document-level ones).
    pub node_id: NodeId,
    /// The actual notification data.
    pub notification: Notification,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}
