//! Storage layer for persisted unit metadata and document-level state.
//!
//! Cellflow never writes to disk itself: persistence is delegated to the
//! host's document-metadata store through the `DocCollection` trait. The
//! in-memory backend backs tests and embedders that bridge their own
//! persistence behind the same trait.

pub mod data;
mod mem;
mod store;

use std::error::Error;

use strum::{AsRefStr, EnumIter};

use crate::{CellflowError, Result};

pub use mem::MemStore;
pub use store::Store;

/// Maps backend errors to CellflowError.
#[allow(unused)]
fn map_db_err(err: impl Error) -> CellflowError {
    CellflowError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    /// Per-unit metadata rows.
    #[strum(serialize = "units")]
    Units,
    /// Document-level rows (edge list, sequence counter).
    #[strum(serialize = "documents")]
    Documents,
}

/// Trait for types that can identify their storage collection.
pub trait DocCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for metadata collection operations.
///
/// Collections are read and rewritten as whole records; the synchronizer
/// never assumes partial-write atomicity beyond last-write-wins at record
/// granularity.
pub trait DocCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Lists every record in insertion order.
    fn list(&self) -> Result<Vec<Self::Item>>;

    /// Creates a new record.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for store backend initialization.
pub trait StoreBackend {
    /// Initializes the backend and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    );
}
