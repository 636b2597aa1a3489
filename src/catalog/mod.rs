//! Algorithm catalog interface.
//!
//! The catalog supplies schema definitions by function id; the compiler
//! only consumes schema, it never invents it. CRUD on the catalog itself
//! belongs to the host application.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{ShareLock, model::NodeSchema};

/// Source of schema definitions, keyed by function id.
pub trait Catalog: Send + Sync {
    /// Look up the schema for one function id.
    fn lookup(
        &self,
        function_id: &str,
    ) -> Option<NodeSchema>;
}

/// In-memory catalog; the default for tests and embedders that register
/// their algorithm library programmatically.
#[derive(Clone)]
pub struct MemCatalog {
    schemas: ShareLock<HashMap<String, NodeSchema>>,
}

impl Default for MemCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemCatalog {
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// register a schema under its function id
    pub fn register(
        &self,
        schema: NodeSchema,
    ) {
        self.schemas.write().unwrap().insert(schema.function_id.clone(), schema);
    }
}

impl Catalog for MemCatalog {
    fn lookup(
        &self,
        function_id: &str,
    ) -> Option<NodeSchema> {
        self.schemas.read().unwrap().get(function_id).cloned()
    }
}
