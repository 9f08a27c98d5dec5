//! The computed schedule and its query API.
//!
//! A [`Schedule`] is the pipeline's only success output: the ordered firing
//! plan plus the diagnostics consumers ask for (component membership,
//! firing counts, strategy used). It is tied to the exact graph value it
//! was computed from through the graph's stamp; a structurally equal graph
//! built separately will not match.

use sdflow_core::{FlowGraph, GraphStamp, NodeId};
use serde::{Deserialize, Serialize};

use crate::balance::RepetitionVector;
use crate::config::ScheduleStrategy;
use crate::scc::{SccId, SccSet};

/// One element of a schedule: a single firing or a repeated body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleElement {
    /// Fire one node once.
    Firing(NodeId),
    /// Run `body` in order, `count` times.
    Loop {
        count: u64,
        body: Vec<ScheduleElement>,
    },
}

/// A complete, validated firing plan for one graph value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    elements: Vec<ScheduleElement>,
    strategy: ScheduleStrategy,
    graph_stamp: GraphStamp,
    sccs: SccSet,
    repetitions: RepetitionVector,
}

impl Schedule {
    pub(crate) fn new(
        elements: Vec<ScheduleElement>,
        strategy: ScheduleStrategy,
        graph_stamp: GraphStamp,
        sccs: SccSet,
        repetitions: RepetitionVector,
    ) -> Self {
        Schedule {
            elements,
            strategy,
            graph_stamp,
            sccs,
            repetitions,
        }
    }

    /// The structured view: loop boundaries and repeat counts preserved,
    /// for consumers that want to emit real loops.
    pub fn elements(&self) -> &[ScheduleElement] {
        &self.elements
    }

    /// The flat view: one node firing at a time, loops expanded.
    pub fn firings(&self) -> Firings<'_> {
        Firings {
            stack: vec![Frame {
                body: &self.elements,
                position: 0,
                remaining: 1,
            }],
        }
    }

    /// Which strategy produced this schedule.
    pub fn strategy(&self) -> ScheduleStrategy {
        self.strategy
    }

    /// Stamp of the graph this schedule was computed for.
    pub fn graph_stamp(&self) -> GraphStamp {
        self.graph_stamp
    }

    /// Returns `true` if this schedule was computed from exactly this graph
    /// value (or a clone of it).
    pub fn is_for<A>(&self, graph: &FlowGraph<A>) -> bool {
        self.graph_stamp == graph.stamp()
    }

    /// The component a node was scheduled in.
    pub fn scc_of(&self, node: NodeId) -> Option<SccId> {
        self.sccs.scc_of(node)
    }

    /// Member nodes of a component, ascending.
    pub fn scc_members(&self, id: SccId) -> Option<&[NodeId]> {
        self.sccs.get(id).map(|scc| scc.nodes.as_slice())
    }

    /// Number of components the graph decomposed into.
    pub fn scc_count(&self) -> usize {
        self.sccs.len()
    }

    /// How many times a node fires over one complete iteration.
    pub fn firing_count(&self, node: NodeId) -> u64 {
        self.repetitions.count(node)
    }

    /// The full repetition vector.
    pub fn repetitions(&self) -> &RepetitionVector {
        &self.repetitions
    }

    /// Total firings in one complete iteration.
    pub fn total_firings(&self) -> u64 {
        self.repetitions.total_firings()
    }
}

struct Frame<'a> {
    body: &'a [ScheduleElement],
    position: usize,
    remaining: u64,
}

/// Loop-expanding iterator over a schedule's firings.
pub struct Firings<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for Firings<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.position < frame.body.len() {
                let element = &frame.body[frame.position];
                frame.position += 1;
                match element {
                    ScheduleElement::Firing(node) => return Some(*node),
                    ScheduleElement::Loop { count, body } => {
                        if *count > 0 && !body.is_empty() {
                            self.stack.push(Frame {
                                body,
                                position: 0,
                                remaining: *count,
                            });
                        }
                    }
                }
            } else if frame.remaining > 1 {
                frame.remaining -= 1;
                frame.position = 0;
            } else {
                self.stack.pop();
            }
        }
    }
}
