//! Topology validation: rejection of zero-delay cycles.
//!
//! A cycle is only schedulable if at least one of its edges carries an
//! initial token (a delay), because that token is what lets the cycle start
//! firing. Equivalently, the subgraph of zero-delay edges must be acyclic.
//! This check runs before everything else in the pipeline and is the one
//! failure with no fallback.

use sdflow_core::{FlowGraph, NodeId};

use crate::error::ScheduleError;

/// Visit state of one node during the depth-first search.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    /// On the recursion stack: an edge back into this node closes a cycle.
    Active,
    Done,
}

/// One explicit DFS frame: a node and its zero-delay successors, with a
/// cursor into them.
struct Frame {
    node: NodeId,
    successors: Vec<NodeId>,
    next: usize,
}

/// Checks that the zero-delay subgraph of `graph` is acyclic.
///
/// Roots are visited in ascending node-insertion order and successors in
/// edge-insertion order, so the first illegal cycle found is deterministic
/// for a given graph value. The reported cycle starts at the first repeated
/// node and repeats it at the end.
pub fn validate_topology<A>(graph: &FlowGraph<A>) -> Result<(), ScheduleError> {
    let node_slots = graph.nodes().map(|n| n.0 as usize).max().map_or(0, |m| m + 1);
    let mut marks = vec![Mark::Unvisited; node_slots];
    // Current DFS path, parallel to the frame stack.
    let mut path: Vec<NodeId> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for root in graph.nodes() {
        if marks[root.0 as usize] != Mark::Unvisited {
            continue;
        }
        marks[root.0 as usize] = Mark::Active;
        path.push(root);
        stack.push(Frame {
            node: root,
            successors: zero_delay_successors(graph, root),
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.successors.len() {
                let target = frame.successors[frame.next];
                frame.next += 1;
                match marks[target.0 as usize] {
                    Mark::Unvisited => {
                        marks[target.0 as usize] = Mark::Active;
                        path.push(target);
                        stack.push(Frame {
                            node: target,
                            successors: zero_delay_successors(graph, target),
                            next: 0,
                        });
                    }
                    Mark::Active => {
                        // Back edge with no delay anywhere along the closing
                        // path: the cycle runs from the repeated node to the
                        // top of the current path.
                        let start = path
                            .iter()
                            .position(|&n| n == target)
                            .unwrap_or_default();
                        let mut cycle: Vec<NodeId> = path[start..].to_vec();
                        cycle.push(target);
                        return Err(ScheduleError::IllegalCycle { cycle });
                    }
                    Mark::Done => {}
                }
            } else {
                marks[frame.node.0 as usize] = Mark::Done;
                path.pop();
                stack.pop();
            }
        }
    }

    Ok(())
}

/// Targets of a node's zero-delay out-edges, in edge-insertion order.
fn zero_delay_successors<A>(graph: &FlowGraph<A>, node: NodeId) -> Vec<NodeId> {
    graph
        .out_edges(node)
        .into_iter()
        .filter(|&e| graph.delay(e) == Some(0))
        .filter_map(|e| graph.endpoints(e).map(|(_, target)| target))
        .collect()
}
