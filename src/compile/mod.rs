//! Graph-to-code compilation.
//!
//! Three layers, leaf first: the value formatter renders one typed parameter
//! value as a Python literal, the node compiler emits the source fragment
//! for one node, and the graph compiler assembles the whole-graph batch
//! export in topological order.

mod format;
mod graph;
mod node;

pub use format::{format_value, is_identifier};
pub use graph::compile_graph;
pub use node::{CompileOptions, HELPER_IMPORT, compile_node};
