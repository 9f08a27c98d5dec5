//! Static scheduling pipeline for dataflow graphs.
//!
//! Given a [`FlowGraph`] the pipeline:
//! 1. validates the topology (no cycle without a delay token),
//! 2. decomposes it into strongly connected components in condensation order,
//! 3. solves the rate balance equations for minimal firing counts,
//! 4. builds a flat or looped firing schedule.
//!
//! The whole pipeline is a pure synchronous function of the graph value: no
//! threads, no I/O, no shared state. Independent analyses of independent
//! graphs can run from parallel threads. Any infeasibility surfaces as one
//! typed [`ScheduleError`]; no partial schedule is ever returned.
//!
//! ```
//! use sdflow_core::{FlowGraph, PortDecl};
//! use sdflow_sched::{analyze, SchedulerConfig};
//!
//! let graph = FlowGraph::new();
//! let (graph, producer) = graph
//!     .add_node("producer", vec![PortDecl::output_with_rate(2)])
//!     .unwrap();
//! let (graph, consumer) = graph.add_node("consumer", vec![PortDecl::input()]).unwrap();
//! let out = graph.output_ports(producer).unwrap()[0];
//! let inp = graph.input_ports(consumer).unwrap()[0];
//! let (graph, _) = graph.add_edge(out, inp, 0).unwrap();
//!
//! let schedule = analyze(&graph, &SchedulerConfig::default()).unwrap();
//! let fired: Vec<_> = schedule.firings().collect();
//! assert_eq!(fired, vec![producer, consumer, consumer]);
//! ```

pub mod balance;
pub mod builder;
pub mod config;
pub mod error;
pub mod scc;
pub mod schedule;
pub mod validate;

pub use balance::{solve_balance, RepetitionVector};
pub use config::{ScheduleStrategy, SchedulerConfig};
pub use error::ScheduleError;
pub use scc::{analyze_sccs, Scc, SccId, SccSet};
pub use schedule::{Firings, Schedule, ScheduleElement};
pub use validate::validate_topology;

use sdflow_core::FlowGraph;

/// Runs the full analysis pipeline on one graph snapshot.
///
/// Deterministic: the same graph value and configuration always produce the
/// same schedule (or the same error).
pub fn analyze<A>(
    graph: &FlowGraph<A>,
    config: &SchedulerConfig,
) -> Result<Schedule, ScheduleError> {
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "analysis started"
    );
    validate_topology(graph)?;
    let sccs = analyze_sccs(graph);
    let repetitions = solve_balance(graph, &sccs)?;
    builder::build_schedule(graph, config, sccs, repetitions)
}
