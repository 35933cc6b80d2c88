//! Space resolution engine.
//!
//! Resolving a space is a single recursive descent over an immutable node
//! tree. Every decision node is addressed by a canonical path key, handed to
//! a pluggable sampler, and recorded in a trace that can later be replayed.
//!
//! ## How the parts work together
//!
//! ```text
//! Space (NodeRef tree) ──┐
//!                        │  Resolver::run                 (resolve.rs)
//! Sampler ───────────────┼─ container  -> descend by attribute name
//!  (sampler.rs)          ├─ choice     -> PathKey + sample index, descend into option
//!                        ├─ integer    -> PathKey + sample value
//!                        ├─ resampled  -> fresh decision at a new path segment
//!                        ├─ operation  -> args, kwargs, then apply operator
//!                        └─ fidelity   -> sampler fidelity channel
//!                                │
//!                                v
//!                 Value + fidelity + ResolutionTrace  (trace.rs)
//!                               + ResolveMetrics      (metrics.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `path.rs`: canonical `path::shape` keys, formatting and parsing.
//! - `sampler.rs`: the `Sampler` contract, random sampling and
//!   override-with-fallback replay.
//! - `resolve.rs`: the recursive resolver, identity sharing for
//!   non-resampled nodes, and the unused-override check.
//! - `trace.rs`: the resolution trace and its persisted record.
//! - `metrics.rs`: per-resolution counters and timing.
//!
//! ## Determinism
//!
//! Given a fixed tree, fixed sampler outputs per key and declaration-ordered
//! children, the resolved value is fully determined. Keys depend only on the
//! structural position and the distribution shape, never on sampled values
//! other than the chosen option indices that lead to them.
//!
//! ## Debugging
//!
//! Decisions are logged at `trace` level under the `respace::engine` target.

#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/path.rs"]
mod path;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/sampler.rs"]
mod sampler;
#[path = "engine/trace.rs"]
mod trace;

pub use metrics::ResolveMetrics;
pub use path::{PathKey, Shape};
pub(crate) use resolve::{Resolver, RunResult};
pub use sampler::{OverrideSampler, OverrideTable, RandomSampler, Sample, SampleOrigin, Sampler};
pub use trace::{ResolutionTrace, TraceRecord};
