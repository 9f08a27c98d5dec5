//! Balance-equation solver: repetition vectors.
//!
//! Every edge imposes `f_src * production = f_dst * consumption` on the
//! firing counts of its endpoints. The solver fixes one node of each
//! rate-connected component at a count of 1 and propagates exact fractions
//! across incident edges in both directions; a node reached with two
//! different implied fractions means the system has no solution. Scaling
//! each component by the least common multiple of its denominators then
//! yields the minimal positive integer vector (the seed's entry guarantees
//! the scaled counts share no common factor).
//!
//! Connectivity here is undirected: edge direction determines which side of
//! the balance equation a rate lands on, not which nodes belong together.
//! Components with no rate path between them are normalized independently.

use std::collections::VecDeque;

use indexmap::IndexMap;
use num_integer::lcm;
use num_rational::Ratio;
use sdflow_core::{EdgeId, FlowGraph, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::scc::{SccId, SccSet};

/// Minimal positive firing counts per node, dense over node ids.
///
/// Valid only for the exact graph value it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionVector {
    pub(crate) counts: Vec<u64>,
}

impl RepetitionVector {
    /// Firing count of a node. Zero only for node ids the source graph
    /// never contained.
    pub fn count(&self, node: NodeId) -> u64 {
        self.counts.get(node.0 as usize).copied().unwrap_or(0)
    }

    /// Iterates `(node, count)` pairs in node-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(index, &count)| (NodeId(index as u32), count))
    }

    /// Number of nodes covered.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` for the empty graph's vector.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all firing counts: the length of one complete iteration.
    pub fn total_firings(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Solves the balance equations of `graph`.
///
/// `sccs` is only consulted to attribute an infeasibility to a component in
/// the error value; the equations themselves span rate-connected components
/// regardless of edge direction.
pub fn solve_balance<A>(
    graph: &FlowGraph<A>,
    sccs: &SccSet,
) -> Result<RepetitionVector, ScheduleError> {
    let node_slots = graph.nodes().map(|n| n.0 as usize).max().map_or(0, |m| m + 1);
    let mut counts = vec![0u64; node_slots];

    // Undirected incidence lists, edge-insertion order per node.
    let mut incident: Vec<Vec<EdgeId>> = vec![Vec::new(); node_slots];
    for edge in graph.edges() {
        if let Some((source, target)) = graph.endpoints(edge) {
            incident[source.0 as usize].push(edge);
            if target != source {
                incident[target.0 as usize].push(edge);
            }
        }
    }

    // Insertion-ordered so component normalization below is deterministic.
    let mut fractions: IndexMap<NodeId, Ratio<u64>> = IndexMap::new();

    for seed in graph.nodes() {
        if fractions.contains_key(&seed) {
            continue;
        }
        let mut component = vec![seed];
        fractions.insert(seed, Ratio::from_integer(1));
        let mut queue = VecDeque::from([seed]);

        while let Some(node) = queue.pop_front() {
            let current = fractions[&node];
            for &edge in &incident[node.0 as usize] {
                let Some((source, target)) = graph.endpoints(edge) else {
                    continue;
                };
                let Some((production, consumption)) = graph.edge_rates(edge) else {
                    continue;
                };
                if source == target {
                    // Self-loop: f * p == f * c has a positive solution
                    // exactly when the rates agree.
                    if production != consumption {
                        return Err(infeasible(sccs, edge, node));
                    }
                    continue;
                }
                let (other, implied) = if node == source {
                    (target, current * Ratio::new(production, consumption))
                } else {
                    (source, current * Ratio::new(consumption, production))
                };
                match fractions.get(&other) {
                    Some(&existing) if existing != implied => {
                        return Err(infeasible(sccs, edge, other));
                    }
                    Some(_) => {}
                    None => {
                        fractions.insert(other, implied);
                        component.push(other);
                        queue.push_back(other);
                    }
                }
            }
        }

        let scale = component
            .iter()
            .fold(1u64, |acc, n| lcm(acc, *fractions[n].denom()));
        for &node in &component {
            counts[node.0 as usize] = (fractions[&node] * scale).to_integer();
        }
    }

    tracing::debug!(
        nodes = counts.len(),
        total_firings = counts.iter().sum::<u64>(),
        "balance equations solved"
    );

    Ok(RepetitionVector { counts })
}

fn infeasible(sccs: &SccSet, edge: EdgeId, node: NodeId) -> ScheduleError {
    ScheduleError::InfeasibleRates {
        scc: sccs.scc_of(node).unwrap_or(SccId(0)),
        edge,
        node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scc::analyze_sccs;
    use sdflow_core::PortDecl;

    fn rated_pair(
        producer_rate: u64,
        consumer_rate: u64,
        delay: u64,
    ) -> (FlowGraph<&'static str>, NodeId, NodeId) {
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node("a", vec![PortDecl::output_with_rate(producer_rate)])
            .unwrap();
        let (graph, b) = graph
            .add_node("b", vec![PortDecl::input_with_rate(consumer_rate)])
            .unwrap();
        let out = graph.output_ports(a).unwrap()[0];
        let inp = graph.input_ports(b).unwrap()[0];
        let (graph, _) = graph.add_edge(out, inp, delay).unwrap();
        (graph, a, b)
    }

    fn solve(graph: &FlowGraph<&'static str>) -> Result<RepetitionVector, ScheduleError> {
        let sccs = analyze_sccs(graph);
        solve_balance(graph, &sccs)
    }

    /// Every edge must satisfy `f_src * p == f_dst * c`.
    fn assert_balanced(graph: &FlowGraph<&'static str>, vector: &RepetitionVector) {
        for edge in graph.edges() {
            let (source, target) = graph.endpoints(edge).unwrap();
            let (p, c) = graph.edge_rates(edge).unwrap();
            assert_eq!(
                vector.count(source) * p,
                vector.count(target) * c,
                "edge {edge} unbalanced"
            );
        }
    }

    #[test]
    fn empty_graph_has_empty_vector() {
        let graph: FlowGraph<&str> = FlowGraph::new();
        let vector = solve(&graph).unwrap();
        assert!(vector.is_empty());
        assert_eq!(vector.total_firings(), 0);
    }

    #[test]
    fn isolated_node_fires_once() {
        let graph = FlowGraph::new();
        let (graph, a) = graph.add_node("a", vec![]).unwrap();
        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
    }

    #[test]
    fn producer_consumer_rates_two_one() {
        let (graph, a, b) = rated_pair(2, 1, 0);
        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
        assert_eq!(vector.count(b), 2);
        assert_balanced(&graph, &vector);
    }

    #[test]
    fn fractional_ratio_scales_to_minimal_integers() {
        // p=3, c=2: f_b = 3/2, scaled to {2, 3}.
        let (graph, a, b) = rated_pair(3, 2, 0);
        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 2);
        assert_eq!(vector.count(b), 3);
        assert_balanced(&graph, &vector);
    }

    #[test]
    fn conflicting_parallel_rates_are_infeasible() {
        // A -> B twice: 3:2 and 2:5 imply f_b = 3/2 and f_b = 2/5.
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node(
                "a",
                vec![PortDecl::output_with_rate(3), PortDecl::output_with_rate(2)],
            )
            .unwrap();
        let (graph, b) = graph
            .add_node(
                "b",
                vec![PortDecl::input_with_rate(2), PortDecl::input_with_rate(5)],
            )
            .unwrap();
        let outs = graph.output_ports(a).unwrap().to_vec();
        let ins = graph.input_ports(b).unwrap().to_vec();
        let (graph, _) = graph.add_edge(outs[0], ins[0], 0).unwrap();
        let (graph, second) = graph.add_edge(outs[1], ins[1], 0).unwrap();

        match solve(&graph) {
            Err(ScheduleError::InfeasibleRates { edge, node, .. }) => {
                assert_eq!(edge, second);
                assert_eq!(node, b);
            }
            other => panic!("expected InfeasibleRates, got {:?}", other),
        }
    }

    #[test]
    fn delayed_cycle_with_unit_rates_fires_once_each() {
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node("a", vec![PortDecl::input(), PortDecl::output()])
            .unwrap();
        let (graph, b) = graph
            .add_node("b", vec![PortDecl::input(), PortDecl::output()])
            .unwrap();
        let a_out = graph.output_ports(a).unwrap()[0];
        let a_in = graph.input_ports(a).unwrap()[0];
        let b_out = graph.output_ports(b).unwrap()[0];
        let b_in = graph.input_ports(b).unwrap()[0];
        let (graph, _) = graph.add_edge(a_out, b_in, 0).unwrap();
        let (graph, _) = graph.add_edge(b_out, a_in, 1).unwrap();

        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
        assert_eq!(vector.count(b), 1);
        assert_balanced(&graph, &vector);
    }

    #[test]
    fn multirate_cycle_balances() {
        // a -(p=2,c=1)-> b, b -(p=1,c=2)-> a: f_b = 2 f_a.
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node(
                "a",
                vec![PortDecl::input_with_rate(2), PortDecl::output_with_rate(2)],
            )
            .unwrap();
        let (graph, b) = graph
            .add_node("b", vec![PortDecl::input(), PortDecl::output()])
            .unwrap();
        let a_out = graph.output_ports(a).unwrap()[0];
        let a_in = graph.input_ports(a).unwrap()[0];
        let b_out = graph.output_ports(b).unwrap()[0];
        let b_in = graph.input_ports(b).unwrap()[0];
        let (graph, _) = graph.add_edge(a_out, b_in, 0).unwrap();
        let (graph, _) = graph.add_edge(b_out, a_in, 2).unwrap();

        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
        assert_eq!(vector.count(b), 2);
        assert_balanced(&graph, &vector);
    }

    #[test]
    fn disconnected_components_normalize_independently() {
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node("a", vec![PortDecl::output_with_rate(4)])
            .unwrap();
        let (graph, b) = graph.add_node("b", vec![PortDecl::input()]).unwrap();
        let (graph, lone) = graph.add_node("lone", vec![]).unwrap();
        let out = graph.output_ports(a).unwrap()[0];
        let inp = graph.input_ports(b).unwrap()[0];
        let (graph, _) = graph.add_edge(out, inp, 0).unwrap();

        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
        assert_eq!(vector.count(b), 4);
        assert_eq!(vector.count(lone), 1);
    }

    #[test]
    fn self_loop_with_mismatched_rates_is_infeasible() {
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node(
                "a",
                vec![PortDecl::input_with_rate(2), PortDecl::output_with_rate(3)],
            )
            .unwrap();
        let out = graph.output_ports(a).unwrap()[0];
        let inp = graph.input_ports(a).unwrap()[0];
        let (graph, e) = graph.add_edge(out, inp, 1).unwrap();

        match solve(&graph) {
            Err(ScheduleError::InfeasibleRates { edge, node, .. }) => {
                assert_eq!(edge, e);
                assert_eq!(node, a);
            }
            other => panic!("expected InfeasibleRates, got {:?}", other),
        }
    }

    #[test]
    fn self_loop_with_matching_rates_is_fine() {
        let graph = FlowGraph::new();
        let (graph, a) = graph
            .add_node(
                "a",
                vec![PortDecl::input_with_rate(2), PortDecl::output_with_rate(2)],
            )
            .unwrap();
        let out = graph.output_ports(a).unwrap()[0];
        let inp = graph.input_ports(a).unwrap()[0];
        let (graph, _) = graph.add_edge(out, inp, 2).unwrap();

        let vector = solve(&graph).unwrap();
        assert_eq!(vector.count(a), 1);
    }

    #[test]
    fn iter_walks_nodes_in_insertion_order() {
        let (graph, a, b) = rated_pair(2, 1, 0);
        let vector = solve(&graph).unwrap();
        let pairs: Vec<(NodeId, u64)> = vector.iter().collect();
        assert_eq!(pairs, vec![(a, 1), (b, 2)]);
        assert_eq!(vector.total_firings(), 3);
    }
}
