//! Core data model: schemas, nodes, edges, and the pipeline graph.
//!
//! The graph is an arena of nodes keyed by stable id with edges stored as
//! plain id pairs, so no reference cycle exists at the ownership level. The
//! document store remains the single source of truth; the in-memory graph is
//! always rebuildable from persisted metadata.

mod edge;
mod graph;
mod node;
mod schema;

pub use edge::Edge;
pub use graph::Graph;
pub use node::{Node, NodeStatus, Position};
pub use schema::{Column, NodeId, NodeSchema, Parameter, ParameterRole, Port};
