use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    model::{Column, NodeId, NodeSchema, Position},
    store::{DocCollectionIden, StoreIden},
};

/// Execution-state tag reported by the runtime for one unit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Succeeded,
    Errored,
}

/// Per-unit persisted metadata: everything needed to rebuild the node.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UnitMeta {
    /// unit id within the host document
    pub id: String,
    /// owning document
    pub doc_id: String,
    /// stable node id, assigned once on first observation
    pub node_id: NodeId,
    pub sequence_number: u32,
    #[serde(default)]
    pub position: Position,
    /// schema snapshot taken from the catalog at configuration time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<NodeSchema>,
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub output_variables: HashMap<String, String>,
    #[serde(default)]
    pub output_columns: HashMap<String, Vec<Column>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_state: Option<ExecutionState>,
    /// generated source currently written into the unit
    #[serde(default)]
    pub source: String,
    pub timestamp: i64,
}

impl DocCollectionIden for UnitMeta {
    fn iden() -> StoreIden {
        StoreIden::Units
    }
}
