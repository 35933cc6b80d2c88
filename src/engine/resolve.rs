//! Recursive space resolution.
//!
//! The resolver walks a node tree once, extending the current path at every
//! step, and turns it into a [`Value`]:
//!
//! ```text
//! Container  ── each attribute, `.name`             -> Value::Map
//! Tuple      ── each element, `[i]`                 -> Value::Tuple
//! Choice     ── sample index, option at `.chosen`   -> value of the option
//! Integer    ── sample value                        -> Value::Int
//! Resampled  ── inner at `.resampled_<kind>`, fresh -> value of inner
//! Operation  ── `.args`, `.kwargs{k}`, apply        -> operator output
//! Fidelity   ── sampler fidelity channel            -> Value::Int (+ reported)
//! ```
//!
//! ## Identity sharing
//!
//! A non-resampled decision or operation that is reached a second time (the
//! same `Arc`) reuses the first value. Only `Resampled` forces a new,
//! independently addressed decision, which is what lets one instruction
//! template stand for k independent instructions.
//!
//! ## Failure modes
//!
//! Sampler and operator errors propagate unchanged. After the walk, override
//! entries that no decision consumed fail the run with `KeyMismatch`: either
//! the table is stale or the space changed shape, and the replay contract is
//! broken either way.

use super::metrics::ResolveMetrics;
use super::path::{PathKey, ROOT, Segment, Shape};
use super::sampler::{Sample, SampleOrigin, Sampler};
use super::trace::ResolutionTrace;
use crate::error::{Error, Result};
use crate::{Kwargs, Node, NodeRef, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Output of one resolution pass.
#[derive(Debug, Clone)]
pub(crate) struct RunResult {
    pub value: Value,
    /// Fidelity attribute name and value, when the space declares one.
    pub fidelity: Option<(String, i64)>,
    pub trace: ResolutionTrace,
    pub metrics: ResolveMetrics,
}

pub(crate) struct Resolver<'s> {
    sampler: &'s mut dyn Sampler,
    trace: ResolutionTrace,
    /// Values of non-resampled nodes, keyed by node address.
    shared: HashMap<usize, Value>,
    fidelity: Option<(String, i64)>,
    metrics: ResolveMetrics,
    depth: usize,
}

impl<'s> Resolver<'s> {
    pub(crate) fn new(sampler: &'s mut dyn Sampler) -> Self {
        Resolver {
            sampler,
            trace: ResolutionTrace::default(),
            shared: HashMap::new(),
            fidelity: None,
            metrics: ResolveMetrics::default(),
            depth: 0,
        }
    }

    /// Resolve `root` and check that every override entry was used.
    pub(crate) fn run(mut self, root: &NodeRef) -> Result<RunResult> {
        let started = Instant::now();
        let value = self.resolve(root, ROOT)?;

        let unused = self.sampler.unused_overrides();
        if !unused.is_empty() {
            debug!(unused = unused.len(), "override entries left unconsumed");
            return Err(Error::KeyMismatch { keys: unused });
        }

        self.metrics.total = started.elapsed();
        debug!(
            decisions = self.metrics.decisions,
            overridden = self.metrics.overridden,
            sampled = self.metrics.sampled,
            shared = self.metrics.shared,
            elapsed = ?self.metrics.total,
            "resolution complete"
        );

        Ok(RunResult { value, fidelity: self.fidelity, trace: self.trace, metrics: self.metrics })
    }

    fn resolve(&mut self, node: &NodeRef, path: &str) -> Result<Value> {
        let shareable = matches!(node.as_ref(), Node::Choice(_) | Node::Integer(_) | Node::Operation(_));
        let id = Arc::as_ptr(node) as usize;

        if shareable {
            if let Some(value) = self.shared.get(&id) {
                self.metrics.shared += 1;
                trace!(path, kind = node.kind(), "shared node reused");
                return Ok(value.clone());
            }
        }

        let value = self.resolve_fresh(node, path)?;
        if shareable {
            self.shared.insert(id, value.clone());
        }
        Ok(value)
    }

    fn resolve_fresh(&mut self, node: &NodeRef, path: &str) -> Result<Value> {
        self.depth += 1;
        self.metrics.max_depth = self.metrics.max_depth.max(self.depth);

        let result = match node.as_ref() {
            Node::Literal(value) => Ok(value.clone()),
            Node::Tuple(items) => self.resolve_tuple(items, path),
            Node::Container(container) => {
                let mut entries = IndexMap::with_capacity(container.entries().len());
                for (name, child) in container.entries() {
                    let value = self.resolve(child, &Segment::Attr(name).append_to(path))?;
                    entries.insert(name.clone(), value);
                }
                Ok(Value::Map(entries))
            }
            Node::Choice(choice) => {
                let key = PathKey::new(path, Shape::Choice { options: choice.len() });
                let index = self.decide(&key)?;
                let option = &choice.options()[index as usize];
                self.resolve(option, &Segment::Chosen.append_to(path))
            }
            Node::Integer(range) => {
                let key = PathKey::new(path, Shape::Integer(*range));
                self.decide(&key).map(Value::Int)
            }
            Node::Resampled(inner) => self.resolve_fresh(inner, &Segment::Resampled(inner.kind()).append_to(path)),
            Node::Operation(operation) => {
                let args = match self.resolve(&operation.args, &Segment::Args.append_to(path))? {
                    Value::Tuple(items) => items,
                    single => vec![single],
                };
                let mut kwargs = Kwargs::with_capacity(operation.kwargs.len());
                for (name, child) in &operation.kwargs {
                    let value = self.resolve(child, &Segment::Kwarg(name).append_to(path))?;
                    kwargs.insert(name.clone(), value);
                }
                self.metrics.operations += 1;
                trace!(path, operator = operation.operator.name, args = args.len(), "apply operator");
                operation.operator.apply(&args, &kwargs)
            }
            Node::Fidelity(range) => {
                let name = path.rsplit('.').next().unwrap_or(path);
                let key = PathKey::new(path, Shape::Integer(*range));
                self.decide_fidelity(name, &key).map(Value::Int)
            }
        };

        self.depth -= 1;
        result
    }

    fn resolve_tuple(&mut self, items: &[NodeRef], path: &str) -> Result<Value> {
        let mut values = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            values.push(self.resolve(item, &Segment::Index(idx).append_to(path))?);
        }
        Ok(Value::Tuple(values))
    }

    fn decide(&mut self, key: &PathKey) -> Result<i64> {
        let sample = self.sampler.sample(key)?;
        self.accept(key, sample)?;
        self.trace.record(key, sample.value);
        Ok(sample.value)
    }

    fn decide_fidelity(&mut self, name: &str, key: &PathKey) -> Result<i64> {
        if let Some((existing, _)) = &self.fidelity {
            return Err(Error::InvalidConfig(format!("space declares two fidelity attributes: `{existing}` and `{name}`")));
        }
        let sample = self.sampler.sample_fidelity(name, key)?;
        self.accept(key, sample)?;
        self.trace.record_environment(name, sample.value);
        self.fidelity = Some((name.to_string(), sample.value));
        Ok(sample.value)
    }

    /// Validate a sampled value against the key's domain and count it.
    fn accept(&mut self, key: &PathKey, sample: Sample) -> Result<()> {
        if !key.shape.contains(sample.value) {
            return Err(Error::Domain { key: key.to_string(), value: sample.value, domain: key.shape.domain() });
        }
        self.metrics.decisions += 1;
        match sample.origin {
            SampleOrigin::Override => self.metrics.overridden += 1,
            SampleOrigin::Random => self.metrics.sampled += 1,
        }
        trace!(key = %key, value = sample.value, origin = ?sample.origin, "decision");
        Ok(())
    }
}
