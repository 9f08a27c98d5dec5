//! FlowGraph: the persistent dataflow-graph container.
//!
//! [`FlowGraph`] is the single entry point for constructing and querying a
//! dataflow model. It is a *persistent* value: [`add_node`](FlowGraph::add_node)
//! and [`add_edge`](FlowGraph::add_edge) never mutate the receiver, they
//! return an extended copy. Analysis passes therefore run against a snapshot
//! that cannot change underneath them, and independent snapshots can be
//! analyzed from parallel threads without sharing.
//!
//! # Layout
//!
//! Nodes and channels live in a `StableGraph` keyed by dense `u32` indices;
//! ports live in a flat arena on the side, and nodes hold ordered `PortId`
//! lists. Nothing is ever removed, so every id doubles as an insertion index
//! and ordering ids reproduces insertion order. All ordered accessors
//! (`successors`, `predecessors`, `in_edges`, `out_edges`) are sorted by edge
//! index because petgraph iterates adjacency newest-first.
//!
//! Each structural edit mints a fresh [`GraphStamp`]; artifacts computed from
//! a graph carry its stamp, tying them to that exact value rather than to
//! anything structurally equal.

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::edge::Channel;
use crate::error::GraphError;
use crate::id::{EdgeId, GraphStamp, NodeId, PortId};
use crate::node::{ActorNode, Port, PortDecl, PortDirection};

/// A persistent dataflow graph of actors, ports, and token channels.
///
/// `A` is the opaque actor payload. The engine only ever reads rates and
/// delays; the payload is carried around untouched for the caller's benefit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph<A> {
    /// Nodes and channels, keyed by dense stable indices.
    graph: StableGraph<ActorNode<A>, Channel, Directed, u32>,
    /// Port arena, indexed by `PortId`.
    ports: Vec<Port>,
    /// Identity of this graph value.
    stamp: GraphStamp,
}

impl<A> FlowGraph<A> {
    /// Creates an empty graph with a fresh stamp.
    pub fn new() -> Self {
        FlowGraph {
            graph: StableGraph::new(),
            ports: Vec::new(),
            stamp: GraphStamp::mint(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Returns the identity stamp of this graph value.
    pub fn stamp(&self) -> GraphStamp {
        self.stamp
    }

    /// Returns a read-only reference to the underlying petgraph structure.
    pub fn graph(&self) -> &StableGraph<ActorNode<A>, Channel, Directed, u32> {
        &self.graph
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of channels.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the number of declared ports across all nodes.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Iterates node ids in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId::from)
    }

    /// Iterates edge ids in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices().map(EdgeId::from)
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&ActorNode<A>> {
        self.graph.node_weight(id.into())
    }

    /// Looks up a node's actor payload by id.
    pub fn actor(&self, id: NodeId) -> Option<&A> {
        self.node(id).map(|n| &n.actor)
    }

    /// Looks up a port by id.
    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id.0 as usize)
    }

    /// Looks up a channel by edge id.
    pub fn channel(&self, id: EdgeId) -> Option<&Channel> {
        self.graph.edge_weight(id.into())
    }

    /// Returns the (source node, target node) pair of an edge.
    pub fn endpoints(&self, id: EdgeId) -> Option<(NodeId, NodeId)> {
        self.graph
            .edge_endpoints(id.into())
            .map(|(s, t)| (NodeId::from(s), NodeId::from(t)))
    }

    /// Returns the (production, consumption) rate pair of an edge, inherited
    /// from its endpoint ports.
    pub fn edge_rates(&self, id: EdgeId) -> Option<(u64, u64)> {
        let channel = self.channel(id)?;
        let src = self.port(channel.source_port)?;
        let dst = self.port(channel.target_port)?;
        Some((src.rate, dst.rate))
    }

    /// Returns the initial token count of an edge.
    pub fn delay(&self, id: EdgeId) -> Option<u64> {
        self.channel(id).map(|c| c.delay)
    }

    /// Returns a node's input ports in declaration order.
    pub fn input_ports(&self, id: NodeId) -> Option<&[PortId]> {
        self.node(id).map(|n| n.inputs.as_slice())
    }

    /// Returns a node's output ports in declaration order.
    pub fn output_ports(&self, id: NodeId) -> Option<&[PortId]> {
        self.node(id).map(|n| n.outputs.as_slice())
    }

    // -----------------------------------------------------------------------
    // Adjacency (edge-insertion order)
    // -----------------------------------------------------------------------

    /// Returns the targets of a node's outgoing edges in edge-insertion
    /// order. Parallel edges yield the same target more than once.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.directed_edges(id, Direction::Outgoing)
            .into_iter()
            .map(|(_, other)| other)
            .collect()
    }

    /// Returns the sources of a node's incoming edges in edge-insertion
    /// order. Parallel edges yield the same source more than once.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.directed_edges(id, Direction::Incoming)
            .into_iter()
            .map(|(_, other)| other)
            .collect()
    }

    /// Returns a node's outgoing edge ids in insertion order.
    pub fn out_edges(&self, id: NodeId) -> Vec<EdgeId> {
        self.directed_edges(id, Direction::Outgoing)
            .into_iter()
            .map(|(edge, _)| edge)
            .collect()
    }

    /// Returns a node's incoming edge ids in insertion order.
    pub fn in_edges(&self, id: NodeId) -> Vec<EdgeId> {
        self.directed_edges(id, Direction::Incoming)
            .into_iter()
            .map(|(edge, _)| edge)
            .collect()
    }

    /// Shared walk for the ordered adjacency accessors. petgraph yields
    /// adjacency newest-first, so sort by edge index to recover insertion
    /// order. The second tuple element is the far endpoint.
    fn directed_edges(&self, id: NodeId, dir: Direction) -> Vec<(EdgeId, NodeId)> {
        let idx: NodeIndex<u32> = id.into();
        let mut edges: Vec<(EdgeIndex<u32>, NodeIndex<u32>)> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(e, _)| e.index());
        edges
            .into_iter()
            .map(|(e, n)| (EdgeId::from(e), NodeId::from(n)))
            .collect()
    }
}

impl<A: Clone> FlowGraph<A> {
    // -----------------------------------------------------------------------
    // Persistent updates
    // -----------------------------------------------------------------------

    /// Adds a node with the given actor payload and port declarations,
    /// returning the extended graph and the new node's id. The receiver is
    /// left untouched.
    ///
    /// Ports are allocated in declaration order; their ids can be read back
    /// through [`input_ports`](Self::input_ports) /
    /// [`output_ports`](Self::output_ports). Errors if any declared rate is 0.
    pub fn add_node(&self, actor: A, ports: Vec<PortDecl>) -> Result<(Self, NodeId), GraphError> {
        for (position, decl) in ports.iter().enumerate() {
            if decl.rate == 0 {
                return Err(GraphError::ZeroRatePort { position });
            }
        }

        let mut next = self.clone();
        next.stamp = GraphStamp::mint();

        let idx = next.graph.add_node(ActorNode {
            actor,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
        });
        let node_id = NodeId::from(idx);

        let mut inputs: SmallVec<[PortId; 2]> = SmallVec::new();
        let mut outputs: SmallVec<[PortId; 2]> = SmallVec::new();
        for decl in &ports {
            let port_id = PortId(next.ports.len() as u32);
            next.ports.push(Port {
                node: node_id,
                direction: decl.direction,
                rate: decl.rate,
            });
            match decl.direction {
                PortDirection::Input => inputs.push(port_id),
                PortDirection::Output => outputs.push(port_id),
            }
        }
        next.graph[idx].inputs = inputs;
        next.graph[idx].outputs = outputs;

        #[cfg(debug_assertions)]
        next.assert_consistency();

        Ok((next, node_id))
    }

    /// Adds a channel from an output port to an input port, returning the
    /// extended graph and the new edge's id. The receiver is left untouched.
    ///
    /// Both ports must exist and run in the right direction. No cycle
    /// legality is checked here; that is the validator's job.
    pub fn add_edge(
        &self,
        source: PortId,
        target: PortId,
        delay: u64,
    ) -> Result<(Self, EdgeId), GraphError> {
        let src = *self
            .port(source)
            .ok_or(GraphError::PortNotFound { id: source })?;
        let dst = *self
            .port(target)
            .ok_or(GraphError::PortNotFound { id: target })?;

        if !src.is_output() {
            return Err(GraphError::InvalidEdge {
                reason: format!("source PortId({}) is not an output port", source.0),
            });
        }
        if !dst.is_input() {
            return Err(GraphError::InvalidEdge {
                reason: format!("target PortId({}) is not an input port", target.0),
            });
        }

        let mut next = self.clone();
        next.stamp = GraphStamp::mint();

        let idx = next.graph.add_edge(
            src.node.into(),
            dst.node.into(),
            Channel {
                source_port: source,
                target_port: target,
                delay,
            },
        );

        #[cfg(debug_assertions)]
        next.assert_consistency();

        Ok((next, EdgeId::from(idx)))
    }

    // -----------------------------------------------------------------------
    // Debug consistency assertion
    // -----------------------------------------------------------------------

    /// Verifies arena integrity: every port's owner exists, every node's
    /// port lists point back at it with matching direction, and every
    /// channel connects an output port to an input port on the petgraph
    /// endpoints it is stored between.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for (i, port) in self.ports.iter().enumerate() {
            assert!(port.rate >= 1, "Port {} has zero rate", i);
            assert!(
                self.graph.node_weight(port.node.into()).is_some(),
                "Port {} owned by missing node {:?}",
                i,
                port.node
            );
        }
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            for &pid in node.inputs.iter() {
                let port = &self.ports[pid.0 as usize];
                assert_eq!(port.node, NodeId::from(idx), "Input port owner mismatch");
                assert!(port.is_input(), "Input list holds non-input port");
            }
            for &pid in node.outputs.iter() {
                let port = &self.ports[pid.0 as usize];
                assert_eq!(port.node, NodeId::from(idx), "Output port owner mismatch");
                assert!(port.is_output(), "Output list holds non-output port");
            }
        }
        for eidx in self.graph.edge_indices() {
            let channel = &self.graph[eidx];
            let src = &self.ports[channel.source_port.0 as usize];
            let dst = &self.ports[channel.target_port.0 as usize];
            assert!(src.is_output(), "Channel source is not an output port");
            assert!(dst.is_input(), "Channel target is not an input port");
            let (s, t) = self
                .graph
                .edge_endpoints(eidx)
                .expect("edge index from iteration must resolve");
            assert_eq!(src.node, NodeId::from(s), "Channel source owner mismatch");
            assert_eq!(dst.node, NodeId::from(t), "Channel target owner mismatch");
        }
    }
}

impl<A> Default for FlowGraph<A> {
    fn default() -> Self {
        Self::new()
    }
}
