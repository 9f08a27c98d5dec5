//! Persistent dataflow-graph model: actors, rated ports, delay-carrying
//! channels. The analysis pipeline lives in `sdflow-sched`.

pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;

// Re-export commonly used types
pub use edge::Channel;
pub use error::GraphError;
pub use graph::FlowGraph;
pub use id::{EdgeId, GraphStamp, NodeId, PortId};
pub use node::{ActorNode, Port, PortDecl, PortDirection};
