//! In-memory store backend.
//!
//! Backs the test suite and embedders that mirror collections into their
//! own persistence layer through store events.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    CellflowError, Result, ShareLock,
    store::{DocCollection, Store, StoreBackend, data::*},
};

/// One in-memory collection preserving insertion order.
pub struct Collect<T> {
    name: String,
    rows: ShareLock<HashMap<String, T>>,
    order: ShareLock<Vec<String>>,
}

impl<T> Collect<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

/// Key extraction for in-memory rows.
pub trait MemDocument {
    fn id(&self) -> &str;
}

impl MemDocument for UnitMeta {
    fn id(&self) -> &str {
        &self.id
    }
}

impl MemDocument for DocumentMeta {
    fn id(&self) -> &str {
        &self.id
    }
}

impl<T> DocCollection for Collect<T>
where
    T: MemDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.rows.read().unwrap().contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<T> {
        self.rows.read().unwrap().get(id).cloned().ok_or(CellflowError::Store(format!("cannot find {} by id {}", self.name, id)))
    }

    fn list(&self) -> Result<Vec<T>> {
        let rows = self.rows.read().unwrap();
        Ok(self.order.read().unwrap().iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    fn create(
        &self,
        data: &T,
    ) -> Result<bool> {
        let id = data.id().to_string();
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(&id) {
            return Err(CellflowError::Store(format!("{} id {} already exists", self.name, id)));
        }
        self.order.write().unwrap().push(id.clone());
        rows.insert(id, data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &T,
    ) -> Result<bool> {
        let id = data.id().to_string();
        let mut rows = self.rows.write().unwrap();
        if !rows.contains_key(&id) {
            return Err(CellflowError::Store(format!("cannot find {} by id {}", self.name, id)));
        }
        rows.insert(id, data.clone());
        Ok(true)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        let removed = rows.remove(id).is_some();
        if removed {
            self.order.write().unwrap().retain(|r| r != id);
        }
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct MemStore {
    units: Arc<Collect<UnitMeta>>,
    documents: Arc<Collect<DocumentMeta>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemStore {
    fn init(
        &self,
        s: &Store,
    ) {
        s.register(self.units());
        s.register(self.documents());
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            units: Arc::new(Collect::new("units")),
            documents: Arc::new(Collect::new("documents")),
        }
    }

    pub fn units(&self) -> Arc<dyn DocCollection<Item = UnitMeta> + Send + Sync> {
        self.units.clone()
    }

    pub fn documents(&self) -> Arc<dyn DocCollection<Item = DocumentMeta> + Send + Sync> {
        self.documents.clone()
    }
}
