//! Runtime collaborator interface.
//!
//! Cellflow never executes code itself: the host kernel does, and reports
//! back through `SyncEvent::ExecutionStateChanged`. The only direct
//! round-trip is the introspection query used to learn the column shape of
//! produced values.

use async_trait::async_trait;

use crate::{Result, model::Column};

/// Shape of one variable as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableShape {
    pub name: String,
    /// columns of the tabular value; empty when the value is not tabular
    pub columns: Vec<Column>,
}

/// Client for the execution runtime.
///
/// `introspect` is expected to answer within the configured timeout; the
/// introspector treats a late or failed answer as "no columns yet".
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Query the runtime for the column shapes of the given variables.
    async fn introspect(
        &self,
        variables: &[String],
    ) -> Result<Vec<VariableShape>>;
}

/// Runtime stub that knows nothing; used when no kernel is attached.
#[derive(Debug, Clone, Default)]
pub struct NullRuntime;

#[async_trait]
impl RuntimeClient for NullRuntime {
    async fn introspect(
        &self,
        _variables: &[String],
    ) -> Result<Vec<VariableShape>> {
        Ok(Vec::new())
    }
}
