//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// How the builder lays out the firing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStrategy {
    /// One element per firing, loops fully expanded.
    Flat,
    /// Repeated firings are folded into nested loops where a greedy
    /// clustering pass finds common repeat factors.
    Looped,
}

/// Options for one analysis call.
///
/// Plain value handed down the call chain; every call owns its own copy and
/// there is no process-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Strategy used by the schedule builder.
    pub strategy: ScheduleStrategy,
    /// Hard cap on clustering passes in the looped strategy. Hitting the
    /// cap is not an error: the builder falls back to a single loop level.
    pub clustering_passes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            strategy: ScheduleStrategy::Flat,
            clustering_passes: 64,
        }
    }
}

impl SchedulerConfig {
    /// A default-capped configuration using the looped strategy.
    pub fn looped() -> Self {
        SchedulerConfig {
            strategy: ScheduleStrategy::Looped,
            ..SchedulerConfig::default()
        }
    }
}
