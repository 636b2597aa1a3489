mod document;
mod unit;

pub use document::DocumentMeta;
pub use unit::{ExecutionState, UnitMeta};
