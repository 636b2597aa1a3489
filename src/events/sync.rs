use std::collections::HashMap;

use crate::{model::Edge, store::data::ExecutionState};

/// Inbound document and runtime events, processed in delivery order by a
/// single synchronization pass at a time.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A unit appeared in the document (new or first observed).
    UnitAdded {
        unit_id: String,
    },
    /// A unit was deleted from the document.
    UnitRemoved {
        unit_id: String,
    },
    /// Units changed position in the document; metadata is re-read.
    UnitsReordered,
    /// The document was reloaded out of band; the graph is rebuilt.
    DocumentReloaded,
    /// The user assigned an algorithm to a unit.
    NodeConfigured {
        unit_id: String,
        function_id: String,
    },
    /// The user edited parameter values of a configured node.
    ValuesEdited {
        unit_id: String,
        values: HashMap<String, serde_json::Value>,
    },
    /// The user moved a node on the canvas.
    NodeMoved {
        unit_id: String,
        x: f64,
        y: f64,
    },
    /// A user-initiated connect gesture.
    Connect(Edge),
    /// A user-initiated disconnect gesture.
    Disconnect(Edge),
    /// The runtime reported an execution-state transition for a unit.
    ExecutionStateChanged {
        unit_id: String,
        state: ExecutionState,
    },
}

impl SyncEvent {
    pub fn str(&self) -> &str {
        match self {
            SyncEvent::UnitAdded { .. } => "UnitAdded",
            SyncEvent::UnitRemoved { .. } => "UnitRemoved",
            SyncEvent::UnitsReordered => "UnitsReordered",
            SyncEvent::DocumentReloaded => "DocumentReloaded",
            SyncEvent::NodeConfigured { .. } => "NodeConfigured",
            SyncEvent::ValuesEdited { .. } => "ValuesEdited",
            SyncEvent::NodeMoved { .. } => "NodeMoved",
            SyncEvent::Connect(_) => "Connect",
            SyncEvent::Disconnect(_) => "Disconnect",
            SyncEvent::ExecutionStateChanged { .. } => "ExecutionStateChanged",
        }
    }
}
