//! Analysis error types.
//!
//! Every fatal condition of the pipeline surfaces as one [`ScheduleError`]
//! from [`analyze`](crate::analyze); no partial schedule is ever returned.
//! The pipeline is a pure function of the input graph, so re-running it on
//! the same graph value reproduces the same error.

use sdflow_core::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

use crate::scc::SccId;

/// Errors produced by the scheduling pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ScheduleError {
    /// A cycle exists in which no edge carries an initial token. Such a
    /// cycle can never fire: every node waits on another in the same cycle.
    ///
    /// The cycle is reported in traversal discovery order starting from the
    /// first repeated node, which is appended again at the end to close it
    /// (`A -> B -> A` reports `[A, B, A]`).
    #[error("illegal zero-delay cycle through nodes {cycle:?}")]
    IllegalCycle {
        /// The offending node sequence, first node repeated at the end.
        cycle: Vec<NodeId>,
    },

    /// The balance equations of a feedback group admit no positive integer
    /// solution: two different rate paths imply conflicting firing counts
    /// for the same node.
    #[error("no integer firing counts satisfy the rate balance in component {scc} (edge {edge} conflicts at node {node})")]
    InfeasibleRates {
        /// The component whose balance system is inconsistent.
        scc: SccId,
        /// The edge whose rate pair contradicts an already-derived count.
        edge: EdgeId,
        /// The node that received two different implied firing counts.
        node: NodeId,
    },

    /// Firings remain but no node has enough input tokens to run. This can
    /// only happen inside a feedback group whose delay tokens are too few
    /// for the declared consumption rates; the cycle itself is legal, it
    /// just starves.
    #[error("scheduling deadlock: nodes {blocked:?} still owe firings but none can fire")]
    Deadlock {
        /// Nodes with remaining firings, in ascending id order.
        blocked: Vec<NodeId>,
    },
}
