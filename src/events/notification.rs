use std::fmt;

use crate::model::NodeStatus;

/// Outbound notifications toward the editing surface.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A node's derived status changed.
    StatusChanged(NodeStatus),
    /// A node's source fragment was regenerated and written back.
    SourceRegenerated,
    /// A node's input or output column shapes changed.
    ColumnsUpdated,
    /// The in-memory graph was rebuilt from persisted metadata.
    GraphRebuilt,
    /// A connect gesture was rejected.
    EdgeRejected(RejectReason),
}

#[derive(Debug, Clone)]
pub enum RejectReason {
    Cycle,
    Invalid(String),
}

impl Notification {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Notification::EdgeRejected(_))
    }

    pub fn str(&self) -> &str {
        match self {
            Notification::StatusChanged(_) => "StatusChanged",
            Notification::SourceRegenerated => "SourceRegenerated",
            Notification::ColumnsUpdated => "ColumnsUpdated",
            Notification::GraphRebuilt => "GraphRebuilt",
            Notification::EdgeRejected(_) => "EdgeRejected",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            RejectReason::Cycle => write!(f, "connection would create a cycle"),
            RejectReason::Invalid(msg) => write!(f, "invalid connection: {}", msg),
        }
    }
}
