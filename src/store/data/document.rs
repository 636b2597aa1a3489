use serde::{Deserialize, Serialize};

use crate::{
    model::Edge,
    store::{DocCollectionIden, StoreIden},
};

/// Document-level persisted metadata: the edge list and the sequence
/// counter shared by every unit in the document.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DocumentMeta {
    pub id: String,
    /// the full edge list; always rewritten as a whole
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// monotonically increasing; incremented transactionally on each
    /// allocation, never derived from unit positions
    #[serde(default)]
    pub sequence_counter: u32,
    pub timestamp: i64,
}

impl DocCollectionIden for DocumentMeta {
    fn iden() -> StoreIden {
        StoreIden::Documents
    }
}
