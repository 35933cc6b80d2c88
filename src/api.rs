use crate::engine::{
    OverrideSampler, OverrideTable, RandomSampler, ResolutionTrace, ResolveMetrics, Resolver, Sampler, TraceRecord,
};
use crate::error::Result;
use crate::{Container, Node, NodeRef, Value};

/// A named configuration space.
///
/// The root is always a container; its attribute names form the first path
/// segment of every key (`space.<attribute>…`). A space is immutable and can
/// be shared across threads; each resolution brings its own sampler.
#[derive(Debug, Clone)]
pub struct Space {
    name: String,
    root: NodeRef,
}

impl Space {
    pub fn new(name: impl Into<String>, root: Container) -> Self {
        Space { name: name.into(), root: Node::container(root) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }
}

/// Result of resolving a [`Space`].
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Resolved root: a map of attribute name → value.
    pub value: Value,
    /// Name and value of the fidelity attribute, when the space has one.
    pub fidelity: Option<(String, i64)>,
    /// Every decision visited, ready for storage or replay.
    pub trace: ResolutionTrace,
    pub metrics: ResolveMetrics,
}

impl Resolution {
    /// Look up a resolved attribute of the space root.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }

    pub fn fidelity_value(&self) -> Option<i64> {
        self.fidelity.as_ref().map(|(_, value)| *value)
    }

    /// Persistable record of this resolution.
    pub fn record(&self, space: &Space, policy: Option<String>) -> TraceRecord {
        TraceRecord::new(space.name(), policy, &self.trace)
    }
}

/// Resolve `space` with `sampler`.
///
/// # Example
/// ```
/// use respace::{Container, Node, RandomSampler, Space, resolve};
///
/// let space = Space::new("demo", Container::new().with("width", Node::integer(1, 4).unwrap()));
/// let out = resolve(&space, &mut RandomSampler::seeded(1)).unwrap();
/// assert_eq!(out.trace.len(), 1);
/// ```
pub fn resolve(space: &Space, sampler: &mut dyn Sampler) -> Result<Resolution> {
    let run = Resolver::new(sampler).run(space.root())?;
    Ok(Resolution { value: run.value, fidelity: run.fidelity, trace: run.trace, metrics: run.metrics })
}

/// Resolve `space` with purely random draws from `seed`.
pub fn sample(space: &Space, seed: u64) -> Result<Resolution> {
    resolve(space, &mut RandomSampler::seeded(seed))
}

/// Resolve `space` replaying `table`; decisions it does not pin are drawn from `seed`.
pub fn replay(space: &Space, table: &OverrideTable, seed: u64) -> Result<Resolution> {
    let mut sampler = OverrideSampler::new(table, RandomSampler::seeded(seed))?;
    resolve(space, &mut sampler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn demo_space() -> Space {
        let digit = Node::integer(0, 9).unwrap();
        Space::new(
            "demo",
            Container::new()
                .with("digits", tuple![resampled!(digit), resampled!(digit), resampled!(digit)])
                .with("mode", Node::choice(vec![Node::literal(0), Node::literal(1)]).unwrap()),
        )
    }

    #[test]
    fn sample_is_deterministic_per_seed() {
        let space = demo_space();
        let a = sample(&space, 42).unwrap();
        let b = sample(&space, 42).unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn full_trace_replays_exactly() {
        let space = demo_space();
        let first = sample(&space, 9).unwrap();
        let again = replay(&space, &first.trace.to_overrides(), 12345).unwrap();
        assert_eq!(again.value, first.value);
        assert_eq!(again.metrics.sampled, 0);
        assert_eq!(again.metrics.overridden, first.metrics.decisions);
    }

    #[test]
    fn record_names_the_space() {
        let space = demo_space();
        let out = sample(&space, 1).unwrap();
        let record = out.record(&space, None);
        assert_eq!(record.space, "demo");
        assert_eq!(record.samplings, out.trace.samplings);
        assert!(out.attribute("mode").is_some());
        assert_eq!(out.fidelity_value(), None);
    }

    #[test]
    fn stale_tables_are_surfaced() {
        let space = demo_space();
        let table = OverrideTable::new().with_sampling("space.removed::choice__2", 1);
        assert!(matches!(replay(&space, &table, 0), Err(Error::KeyMismatch { .. })));
    }
}
