//! Resolution metrics.
//!
//! Counters are collected on every run; they are cheap and help explain what
//! a replay actually did (how many decisions were pinned vs. drawn).
//!
//! ## Design notes
//!
//! - `decisions == overridden + sampled` always holds.
//! - `shared` counts re-uses of an already resolved, non-resampled node; those
//!   re-uses are not decisions and add no trace keys.

use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveMetrics {
    /// Elapsed time of the whole resolution.
    pub total: Duration,
    /// Decisions visited (choices, integers, fidelity).
    pub decisions: usize,
    /// Decisions answered by an override entry.
    pub overridden: usize,
    /// Decisions answered by random sampling.
    pub sampled: usize,
    /// Encounters answered from an earlier resolution of the same node.
    pub shared: usize,
    /// Operators applied.
    pub operations: usize,
    /// Deepest nesting reached during the walk.
    pub max_depth: usize,
}
