//! Node and port types for the dataflow graph.
//!
//! A node wraps an opaque actor payload: the engine never looks inside it,
//! only at the declared ports. Ports carry the per-firing token rate; the
//! graph stores them in a flat arena and nodes keep ordered [`PortId`] lists,
//! so port declaration order is preserved for deterministic traversal.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{NodeId, PortId};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Whether a port receives or emits tokens, from its owning node's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Tokens flow into the node; the rate is a consumption rate.
    Input,
    /// Tokens flow out of the node; the rate is a production rate.
    Output,
}

/// A port declaration handed to `add_node`: direction plus per-firing rate.
///
/// The rate is the number of tokens consumed (input) or produced (output)
/// each time the owning node fires. Rates must be positive; the default is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    /// Direction relative to the owning node.
    pub direction: PortDirection,
    /// Tokens moved per firing. Must be >= 1.
    pub rate: u64,
}

impl PortDecl {
    /// An input port with the default rate of 1.
    pub fn input() -> Self {
        PortDecl {
            direction: PortDirection::Input,
            rate: 1,
        }
    }

    /// An output port with the default rate of 1.
    pub fn output() -> Self {
        PortDecl {
            direction: PortDirection::Output,
            rate: 1,
        }
    }

    /// An input port consuming `rate` tokens per firing.
    pub fn input_with_rate(rate: u64) -> Self {
        PortDecl {
            direction: PortDirection::Input,
            rate,
        }
    }

    /// An output port producing `rate` tokens per firing.
    pub fn output_with_rate(rate: u64) -> Self {
        PortDecl {
            direction: PortDirection::Output,
            rate,
        }
    }
}

/// A declared port bound to its owning node, stored in the graph's port arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// The node this port belongs to. A port belongs to exactly one node.
    pub node: NodeId,
    /// Direction relative to the owning node.
    pub direction: PortDirection,
    /// Tokens moved per firing. Always >= 1 once inserted.
    pub rate: u64,
}

impl Port {
    /// Returns `true` if this port consumes tokens.
    pub fn is_input(&self) -> bool {
        matches!(self.direction, PortDirection::Input)
    }

    /// Returns `true` if this port produces tokens.
    pub fn is_output(&self) -> bool {
        matches!(self.direction, PortDirection::Output)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A graph node: an opaque actor payload plus its ordered port lists.
///
/// `A` is whatever the model builder wants to attach (a name, a behavior
/// handle, an index into an external actor table). The engine only requires
/// `Clone` for the persistent update operations and never inspects the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorNode<A> {
    /// The external actor payload. Opaque to the engine.
    pub actor: A,
    /// Input ports in declaration order.
    pub inputs: SmallVec<[PortId; 2]>,
    /// Output ports in declaration order.
    pub outputs: SmallVec<[PortId; 2]>,
}

impl<A> ActorNode<A> {
    /// Total number of ports on this node.
    pub fn port_count(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }
}
