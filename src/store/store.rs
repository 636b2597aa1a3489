use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{CellflowError, Result, ShareLock, store::data::*, utils};

use super::{DocCollection, DocCollectionIden, StoreIden};

#[derive(Clone)]
pub struct DynDocSetRef<T>(Arc<dyn DocCollection<Item = T>>);

/// Registry of typed metadata collections backed by a pluggable backend.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DocCollection<Item = DATA>>
    where
        DATA: DocCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDocSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DocCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DocCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDocSetRef::<DATA>(collection)));
    }

    pub fn units(&self) -> Arc<dyn DocCollection<Item = UnitMeta>> {
        self.collection()
    }

    pub fn documents(&self) -> Arc<dyn DocCollection<Item = DocumentMeta>> {
        self.collection()
    }

    /// Fetch the document row, creating an empty one on first access.
    pub fn find_or_create_document(
        &self,
        doc_id: &str,
    ) -> Result<DocumentMeta> {
        trace!("store::find_or_create_document({})", doc_id);
        if doc_id.is_empty() {
            return Err(CellflowError::Store("missing document id".into()));
        }
        let documents = self.documents();
        match documents.find(doc_id) {
            Ok(m) => Ok(m),
            Err(_) => {
                let data = DocumentMeta {
                    id: doc_id.to_string(),
                    edges: Vec::new(),
                    sequence_counter: 0,
                    timestamp: utils::time::time_millis(),
                };
                documents.create(&data)?;
                Ok(data)
            }
        }
    }
}
