use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    CellflowError, Config, Engine, Result,
    catalog::{Catalog, MemCatalog},
    runtime::{NullRuntime, RuntimeClient},
    store::{MemStore, StoreBackend},
};

/// Assembles an [`Engine`] from its collaborators.
///
/// Every part has a default: in-memory store, empty catalog, a runtime
/// client that knows nothing, and a freshly built tokio runtime.
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    backend: Option<Box<dyn StoreBackend>>,
    catalog: Option<Arc<dyn Catalog>>,
    runtime_client: Option<Arc<dyn RuntimeClient>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            backend: None,
            catalog: None,
            runtime_client: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Replace the in-memory store backend.
    pub fn store_backend(
        mut self,
        backend: Box<dyn StoreBackend>,
    ) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn catalog(
        mut self,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Attach the execution-runtime client used for introspection.
    pub fn runtime_client(
        mut self,
        client: Arc<dyn RuntimeClient>,
    ) -> Self {
        self.runtime_client = Some(client);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let runtime = match self.rt {
            Some(rt) => rt,
            None => Arc::new(
                Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.into())
                    .enable_all()
                    .build()
                    .map_err(|e| CellflowError::Engine(e.to_string()))?,
            ),
        };

        let backend = self.backend.unwrap_or_else(|| Box::new(MemStore::new()));
        let catalog = self.catalog.unwrap_or_else(|| Arc::new(MemCatalog::new()));
        let runtime_client = self.runtime_client.unwrap_or_else(|| Arc::new(NullRuntime));

        Ok(Engine::new(self.config, runtime, backend, catalog, runtime_client))
    }
}
