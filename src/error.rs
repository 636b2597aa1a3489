//! Error types for Cellflow.
//!
//! All errors in Cellflow are represented by the `CellflowError` enum,
//! which provides specific variants for different error categories.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Cellflow operations.
///
/// Each variant represents a specific category of error that can occur
/// during graph editing, compilation, or storage operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum CellflowError {
    /// Engine-level errors (startup, shutdown, configuration).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// Graph structure errors (unknown endpoints, duplicate edges).
    #[error("{0}")]
    Graph(String),

    /// Node definition or lifecycle errors.
    #[error("{0}")]
    Node(String),

    /// Edge definition errors (invalid ports, rejected connections).
    #[error("{0}")]
    Edge(String),

    /// Code generation errors other than cycles.
    #[error("{0}")]
    Compile(String),

    /// A whole-graph export found a cycle; no source was emitted.
    #[error("cycle detected involving node '{0}'")]
    Cycle(String),

    /// Runtime collaborator errors (kernel unreachable, introspection failed).
    #[error("{0}")]
    Runtime(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<CellflowError> for String {
    fn from(val: CellflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for CellflowError {
    fn from(error: std::io::Error) -> Self {
        CellflowError::IoError(error.to_string())
    }
}

impl From<CellflowError> for std::io::Error {
    fn from(val: CellflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for CellflowError {
    fn from(_: FromUtf8Error) -> Self {
        CellflowError::Runtime("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for CellflowError {
    fn from(error: serde_json::Error) -> Self {
        CellflowError::Convert(error.to_string())
    }
}
