//! # Cellflow
//!
//! Cellflow keeps a visual data-pipeline graph and the executable code
//! cells of a host document in lockstep. It is designed to be embedded in
//! notebook-style applications: the host delivers document and runtime
//! events, Cellflow compiles nodes to Python source fragments, writes them
//! back, and broadcasts derived-state notifications toward the editing
//! surface.
//!
//! ## Core Features
//!
//! - **Graph-to-code compilation**: every node compiles to one cell-sized
//!   fragment, and the whole graph exports as a standalone program
//! - **Single-writer synchronization**: events are processed strictly in
//!   delivery order by one synchronization pass at a time
//! - **Pluggable collaborators**: storage, algorithm catalog, and the
//!   execution runtime sit behind traits, with in-memory defaults
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cellflow::{EngineBuilder, SyncEvent};
//!
//! let engine = EngineBuilder::new().catalog(catalog).build()?;
//! engine.launch();
//!
//! engine.submit("doc1", SyncEvent::UnitAdded { unit_id: "u1".to_string() })?;
//! let program = engine.export("doc1")?;
//! engine.shutdown();
//! ```

mod builder;
mod catalog;
mod channel;
mod common;
mod compile;
mod config;
mod engine;
mod error;
mod events;
mod model;
mod runtime;
mod store;
mod sync;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use catalog::{Catalog, MemCatalog};
pub use channel::{Channel, ChannelOptions, ChannelSubscription};
pub use compile::{CompileOptions, HELPER_IMPORT, compile_graph, compile_node, format_value};
pub use config::Config;
pub use engine::Engine;
pub use error::CellflowError;
pub use events::{Event, Message, Notification, RejectReason, SyncEvent};
pub use model::*;
pub use runtime::{NullRuntime, RuntimeClient, VariableShape};
pub use store::{DocCollection, DocCollectionIden, MemStore, Store, StoreBackend, StoreIden, data};
pub use sync::{infer_label, resolve_status};

/// Result type alias for Cellflow operations.
pub type Result<T> = std::result::Result<T, CellflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
