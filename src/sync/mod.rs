//! Bidirectional synchronization between graph, code, and document.

mod introspect;
mod status;
mod synchronizer;

pub use introspect::Introspector;
pub use status::{infer_label, resolve_status};
pub use synchronizer::Synchronizer;
