//! Schedule construction from the condensation order and repetition vector.
//!
//! Components are laid out strictly in condensation order, which is always
//! token-safe across components: an upstream component fires completely
//! first, and the balance equations guarantee it produces exactly the
//! tokens its downstream consumers need. Within a feedback component the
//! builder replays token counts edge by edge, firing the lowest-id ready
//! node until every node has used up its repetition count. Initial delay
//! tokens seed the edge buffers, which is what lets a legal feedback cycle
//! start; a zero-delay edge therefore always forces its source ahead of its
//! destination, a delayed edge never does.
//!
//! The looped strategy folds the fired sequence into nested loops with a
//! greedy pairwise clustering pass, bounded by the configured cap. Hitting
//! the cap is not a failure: the component falls back to a single loop
//! level (or a plain flat list when the counts share no factor).

use indexmap::IndexMap;
use num_integer::gcd;
use sdflow_core::{EdgeId, FlowGraph, NodeId};

use crate::balance::RepetitionVector;
use crate::config::{ScheduleStrategy, SchedulerConfig};
use crate::error::ScheduleError;
use crate::scc::{Scc, SccSet};
use crate::schedule::{Schedule, ScheduleElement};

/// Assembles the final schedule. Consumes the analysis artifacts so the
/// schedule can carry them as diagnostics.
pub fn build_schedule<A>(
    graph: &FlowGraph<A>,
    config: &SchedulerConfig,
    sccs: SccSet,
    repetitions: RepetitionVector,
) -> Result<Schedule, ScheduleError> {
    let mut elements: Vec<ScheduleElement> = Vec::new();

    for scc in sccs.iter() {
        if scc.is_trivial() {
            let node = scc.nodes[0];
            let count = repetitions.count(node);
            emit_repeated(&mut elements, config.strategy, node, count);
            continue;
        }

        let fired = replay_component(graph, scc, &repetitions)?;
        match config.strategy {
            ScheduleStrategy::Flat => {
                elements.extend(fired.into_iter().map(ScheduleElement::Firing));
            }
            ScheduleStrategy::Looped => {
                match cluster_segments(run_length_encode(&fired), config.clustering_passes) {
                    Some(segments) => {
                        for segment in segments {
                            emit_segment(&mut elements, segment);
                        }
                    }
                    None => elements.extend(fallback_elements(&fired, &repetitions)),
                }
            }
        }
    }

    tracing::debug!(
        elements = elements.len(),
        total_firings = repetitions.total_firings(),
        strategy = ?config.strategy,
        "schedule assembled"
    );

    Ok(Schedule::new(
        elements,
        config.strategy,
        graph.stamp(),
        sccs,
        repetitions,
    ))
}

/// Emits `count` firings of one node, folded into a loop under the looped
/// strategy.
fn emit_repeated(
    elements: &mut Vec<ScheduleElement>,
    strategy: ScheduleStrategy,
    node: NodeId,
    count: u64,
) {
    match strategy {
        ScheduleStrategy::Flat => {
            elements.extend((0..count).map(|_| ScheduleElement::Firing(node)));
        }
        ScheduleStrategy::Looped => {
            if count > 1 {
                elements.push(ScheduleElement::Loop {
                    count,
                    body: vec![ScheduleElement::Firing(node)],
                });
            } else if count == 1 {
                elements.push(ScheduleElement::Firing(node));
            }
        }
    }
}

/// Replays token counts inside one feedback component, producing the fired
/// node sequence.
///
/// Each intra-component edge buffer starts at its delay. The lowest-id node
/// with firings left whose input buffers all hold at least one consumption's
/// worth of tokens fires next; firing consumes from every input buffer
/// before producing into every output buffer, so a self-loop is handled by
/// the same two steps. If firings remain but nothing is ready, the
/// component starves and scheduling fails.
fn replay_component<A>(
    graph: &FlowGraph<A>,
    scc: &Scc,
    repetitions: &RepetitionVector,
) -> Result<Vec<NodeId>, ScheduleError> {
    let mut buffers: IndexMap<EdgeId, u64> = scc
        .edges
        .iter()
        .map(|&edge| (edge, graph.delay(edge).unwrap_or(0)))
        .collect();

    // Per node: intra-component (edge, consumption) inputs and
    // (edge, production) outputs, and the outstanding firing count.
    let mut inputs: IndexMap<NodeId, Vec<(EdgeId, u64)>> = IndexMap::new();
    let mut outputs: IndexMap<NodeId, Vec<(EdgeId, u64)>> = IndexMap::new();
    let mut remaining: IndexMap<NodeId, u64> = IndexMap::new();
    for &node in &scc.nodes {
        let ins = graph
            .in_edges(node)
            .into_iter()
            .filter(|edge| buffers.contains_key(edge))
            .filter_map(|edge| graph.edge_rates(edge).map(|(_, c)| (edge, c)))
            .collect();
        let outs = graph
            .out_edges(node)
            .into_iter()
            .filter(|edge| buffers.contains_key(edge))
            .filter_map(|edge| graph.edge_rates(edge).map(|(p, _)| (edge, p)))
            .collect();
        inputs.insert(node, ins);
        outputs.insert(node, outs);
        remaining.insert(node, repetitions.count(node));
    }

    let total: u64 = remaining.values().sum();
    let mut fired: Vec<NodeId> = Vec::with_capacity(total as usize);

    while (fired.len() as u64) < total {
        let ready = scc.nodes.iter().copied().find(|&node| {
            remaining[&node] > 0
                && inputs[&node]
                    .iter()
                    .all(|&(edge, consumption)| buffers[&edge] >= consumption)
        });
        let Some(node) = ready else {
            let blocked: Vec<NodeId> = scc
                .nodes
                .iter()
                .copied()
                .filter(|node| remaining[node] > 0)
                .collect();
            return Err(ScheduleError::Deadlock { blocked });
        };

        for &(edge, consumption) in &inputs[&node] {
            buffers[&edge] -= consumption;
        }
        for &(edge, production) in &outputs[&node] {
            buffers[&edge] += production;
        }
        remaining[&node] -= 1;
        tracing::trace!(node = node.0, left = remaining[&node], "fired");
        fired.push(node);
    }

    Ok(fired)
}

/// A run of the fired sequence: `body` repeated `count` times.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    count: u64,
    body: Vec<ScheduleElement>,
}

/// Collapses consecutive firings of the same node into one segment.
fn run_length_encode(fired: &[NodeId]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for &node in fired {
        match segments.last_mut() {
            Some(last) if last.body == [ScheduleElement::Firing(node)] => last.count += 1,
            _ => segments.push(Segment {
                count: 1,
                body: vec![ScheduleElement::Firing(node)],
            }),
        }
    }
    segments
}

/// Greedy pairwise clustering: adjacent segments whose counts share a
/// factor merge into one segment repeated by the factor. Passes repeat
/// until nothing merges; `None` means the cap was hit with merges still
/// pending, which triggers the fallback.
fn cluster_segments(mut segments: Vec<Segment>, cap: usize) -> Option<Vec<Segment>> {
    let mut passes = 0;
    while merge_possible(&segments) {
        if passes == cap {
            return None;
        }
        passes += 1;
        segments = merge_pass(segments);
    }
    Some(segments)
}

fn merge_possible(segments: &[Segment]) -> bool {
    segments
        .windows(2)
        .any(|pair| gcd(pair[0].count, pair[1].count) > 1)
}

/// One left-to-right pass, merging each segment into its predecessor when
/// their counts share a factor.
fn merge_pass(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::new();
    for segment in segments {
        if let Some(last) = merged.last_mut() {
            let common = gcd(last.count, segment.count);
            if common > 1 {
                let mut body = scaled_body(std::mem::take(&mut last.body), last.count / common);
                body.extend(scaled_body(segment.body, segment.count / common));
                last.count = common;
                last.body = body;
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

/// `body` repeated `times` times, as schedule elements.
fn scaled_body(body: Vec<ScheduleElement>, times: u64) -> Vec<ScheduleElement> {
    if times == 1 {
        body
    } else {
        vec![ScheduleElement::Loop { count: times, body }]
    }
}

fn emit_segment(elements: &mut Vec<ScheduleElement>, segment: Segment) {
    if segment.count == 1 {
        elements.extend(segment.body);
    } else {
        elements.push(ScheduleElement::Loop {
            count: segment.count,
            body: segment.body,
        });
    }
}

/// Single-level fallback for a component whose clustering hit the pass cap:
/// one loop repeated by the common factor of all firing counts, body listing
/// each node (in the order it first fired) `count / factor` times. A common
/// factor of 1 degenerates to the plain flat firing list.
fn fallback_elements(fired: &[NodeId], repetitions: &RepetitionVector) -> Vec<ScheduleElement> {
    let mut dependency_order: Vec<NodeId> = Vec::new();
    for &node in fired {
        if !dependency_order.contains(&node) {
            dependency_order.push(node);
        }
    }
    let factor = dependency_order
        .iter()
        .fold(0u64, |acc, &node| gcd(acc, repetitions.count(node)));

    if factor <= 1 {
        return fired.iter().copied().map(ScheduleElement::Firing).collect();
    }
    let body: Vec<ScheduleElement> = dependency_order
        .into_iter()
        .flat_map(|node| {
            let per_round = repetitions.count(node) / factor;
            (0..per_round).map(move |_| ScheduleElement::Firing(node))
        })
        .collect();
    vec![ScheduleElement::Loop {
        count: factor,
        body,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScheduleElement::{Firing, Loop};

    fn firing_segment(count: u64, node: u32) -> Segment {
        Segment {
            count,
            body: vec![Firing(NodeId(node))],
        }
    }

    #[test]
    fn run_length_encode_collapses_runs() {
        let fired = vec![NodeId(0), NodeId(0), NodeId(1), NodeId(0)];
        let segments = run_length_encode(&fired);
        assert_eq!(
            segments,
            vec![
                firing_segment(2, 0),
                firing_segment(1, 1),
                firing_segment(1, 0)
            ]
        );
    }

    #[test]
    fn clustering_merges_adjacent_counts_with_common_factor() {
        let segments = vec![firing_segment(2, 0), firing_segment(2, 1)];
        let clustered = cluster_segments(segments, 64).unwrap();
        assert_eq!(
            clustered,
            vec![Segment {
                count: 2,
                body: vec![Firing(NodeId(0)), Firing(NodeId(1))],
            }]
        );
    }

    #[test]
    fn clustering_scales_uneven_counts_into_nested_loops() {
        // (2, A) (4, B) -> repeat 2 of [A, loop 2 of B]
        let segments = vec![firing_segment(2, 0), firing_segment(4, 1)];
        let clustered = cluster_segments(segments, 64).unwrap();
        assert_eq!(
            clustered,
            vec![Segment {
                count: 2,
                body: vec![
                    Firing(NodeId(0)),
                    Loop {
                        count: 2,
                        body: vec![Firing(NodeId(1))],
                    }
                ],
            }]
        );
    }

    #[test]
    fn clustering_leaves_coprime_counts_alone() {
        let segments = vec![firing_segment(2, 0), firing_segment(3, 1)];
        let clustered = cluster_segments(segments.clone(), 64).unwrap();
        assert_eq!(clustered, segments);
    }

    #[test]
    fn cap_hit_with_pending_merges_reports_none() {
        let segments = vec![firing_segment(2, 0), firing_segment(2, 1)];
        assert_eq!(cluster_segments(segments, 0), None);
    }

    #[test]
    fn converged_input_never_trips_the_cap() {
        let segments = vec![firing_segment(1, 0), firing_segment(2, 1)];
        assert!(cluster_segments(segments, 0).is_some());
    }

    #[test]
    fn fallback_with_common_factor_emits_one_loop_level() {
        let repetitions = RepetitionVector {
            counts: vec![2, 4],
        };
        let fired = vec![NodeId(0), NodeId(1), NodeId(1), NodeId(0), NodeId(1), NodeId(1)];
        let elements = fallback_elements(&fired, &repetitions);
        assert_eq!(
            elements,
            vec![Loop {
                count: 2,
                body: vec![Firing(NodeId(0)), Firing(NodeId(1)), Firing(NodeId(1))],
            }]
        );
    }

    #[test]
    fn fallback_without_common_factor_stays_flat() {
        let repetitions = RepetitionVector {
            counts: vec![1, 2],
        };
        let fired = vec![NodeId(0), NodeId(1), NodeId(1)];
        let elements = fallback_elements(&fired, &repetitions);
        assert_eq!(
            elements,
            vec![Firing(NodeId(0)), Firing(NodeId(1)), Firing(NodeId(1))]
        );
    }
}
