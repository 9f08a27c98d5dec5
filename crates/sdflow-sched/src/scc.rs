//! Strongly connected component decomposition and condensation ordering.
//!
//! After validation every remaining cycle carries a delay token, so the full
//! edge set (delayed edges included) feeds the decomposition. The result is
//! an ordered [`SccSet`]: components numbered in condensation topological
//! order, so iterating the set and scheduling each component completely
//! before the next is always dependency-safe across components.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::algo::tarjan_scc;
use sdflow_core::{EdgeId, FlowGraph, NodeId};
use serde::{Deserialize, Serialize};

/// Identifier of one component: its position in condensation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SccId(pub u32);

impl std::fmt::Display for SccId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One strongly connected component of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scc {
    /// Position in condensation order.
    pub id: SccId,
    /// Member nodes, ascending.
    pub nodes: Vec<NodeId>,
    /// Edges with both endpoints inside this component, in insertion order.
    pub edges: Vec<EdgeId>,
}

impl Scc {
    /// A trivial component: a single node with no self-loop. Such a node
    /// participates in no feedback and needs no token simulation.
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() == 1 && self.edges.is_empty()
    }
}

/// The components of one graph, in condensation topological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SccSet {
    sccs: Vec<Scc>,
    /// Component of each node, indexed by node id.
    membership: Vec<SccId>,
}

impl SccSet {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.sccs.len()
    }

    /// Returns `true` if the graph had no nodes.
    pub fn is_empty(&self) -> bool {
        self.sccs.is_empty()
    }

    /// Components in condensation order.
    pub fn iter(&self) -> impl Iterator<Item = &Scc> {
        self.sccs.iter()
    }

    /// Looks up one component.
    pub fn get(&self, id: SccId) -> Option<&Scc> {
        self.sccs.get(id.0 as usize)
    }

    /// The component a node belongs to.
    pub fn scc_of(&self, node: NodeId) -> Option<SccId> {
        self.membership.get(node.0 as usize).copied()
    }
}

/// Decomposes `graph` into strongly connected components and orders them.
///
/// Tarjan's algorithm produces the components in one linear pass; a Kahn
/// pass over the inter-component edges then fixes the condensation order.
/// When several components are simultaneously ready (no unprocessed
/// predecessor), the one whose lowest-indexed member node is smallest goes
/// first, which makes the order a pure function of insertion order.
pub fn analyze_sccs<A>(graph: &FlowGraph<A>) -> SccSet {
    let components = tarjan_scc(graph.graph());
    let node_slots = graph.nodes().map(|n| n.0 as usize).max().map_or(0, |m| m + 1);

    // Provisional component index per node, in Tarjan output order.
    let mut provisional = vec![0usize; node_slots];
    for (index, members) in components.iter().enumerate() {
        for &node in members {
            provisional[node.index()] = index;
        }
    }

    // Condensation DAG: in-degrees and successor lists over inter-component
    // edges. Parallel inter-component edges each count toward the in-degree,
    // matched by one decrement per edge below.
    let mut in_degree = vec![0usize; components.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    for edge in graph.edges() {
        let (source, target) = match graph.endpoints(edge) {
            Some(pair) => pair,
            None => continue,
        };
        let from = provisional[source.0 as usize];
        let to = provisional[target.0 as usize];
        if from != to {
            in_degree[to] += 1;
            successors[from].push(to);
        }
    }

    // Kahn with a min-heap keyed by each component's lowest member node.
    let lowest_member = |index: usize| -> NodeId {
        components[index]
            .iter()
            .map(|n| NodeId::from(*n))
            .min()
            .unwrap_or(NodeId(0))
    };
    let mut ready: BinaryHeap<Reverse<(NodeId, usize)>> = components
        .iter()
        .enumerate()
        .filter(|(index, _)| in_degree[*index] == 0)
        .map(|(index, _)| Reverse((lowest_member(index), index)))
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(components.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        order.push(index);
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((lowest_member(next), next)));
            }
        }
    }

    // Materialize the ordered set.
    let mut membership = vec![SccId(0); node_slots];
    let mut sccs: Vec<Scc> = Vec::with_capacity(order.len());
    for (position, &index) in order.iter().enumerate() {
        let id = SccId(position as u32);
        let mut nodes: Vec<NodeId> = components[index].iter().map(|n| NodeId::from(*n)).collect();
        nodes.sort();
        for &node in &nodes {
            membership[node.0 as usize] = id;
        }
        sccs.push(Scc {
            id,
            nodes,
            edges: Vec::new(),
        });
    }
    for edge in graph.edges() {
        if let Some((source, target)) = graph.endpoints(edge) {
            let from = membership[source.0 as usize];
            if from == membership[target.0 as usize] {
                sccs[from.0 as usize].edges.push(edge);
            }
        }
    }

    tracing::debug!(
        components = sccs.len(),
        nodes = graph.node_count(),
        "scc decomposition complete"
    );

    SccSet { sccs, membership }
}
