//! Core error types for sdflow-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of graph construction. Everything here is raised while the
//! model builder is still assembling the graph; none of these can surface
//! from a later analysis pass.

use crate::id::PortId;
use thiserror::Error;

/// Errors produced while constructing a dataflow graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An edge referenced a port id that does not exist in the graph.
    #[error("port not found: PortId({id})", id = id.0)]
    PortNotFound { id: PortId },

    /// A port declaration carried a zero rate. Rates are tokens per firing
    /// and must be positive.
    #[error("port declaration {position} has rate 0; rates must be >= 1")]
    ZeroRatePort { position: usize },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },
}
