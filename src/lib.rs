extern crate self as respace;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod evaluate;
pub mod program;
pub mod spaces;

pub use api::{Resolution, Space, replay, resolve, sample};
pub use engine::{
    OverrideSampler, OverrideTable, PathKey, RandomSampler, ResolutionTrace, ResolveMetrics, Sample, SampleOrigin,
    Sampler, Shape, TraceRecord,
};
pub use error::{Error, Result};
pub use evaluate::{Benchmark, evaluate, objective_to_minimize};
pub use spaces::program::{ArityMask, LengthPolicy, PointerKinds, ProgramResolution, ProgramSpace, SpaceConfig};

use crate::program::{Function, Instruction, Program};
use indexmap::IndexMap;
use std::sync::Arc;

// --- Resolved values --------------------------------------------------------

/// Named operands handed to an [`Operator`], in declaration order.
pub type Kwargs = IndexMap<String, Value>;

/// A concrete value produced by resolving a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Function(Function),
    Tuple(Vec<Value>),
    Instruction(Instruction),
    Program(Program),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Function(_) => "function",
            Value::Tuple(_) => "tuple",
            Value::Instruction(_) => "instruction",
            Value::Program(_) => "program",
            Value::Map(_) => "map",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_program(&self) -> Option<&Program> {
        match self {
            Value::Program(p) => Some(p),
            _ => None,
        }
    }

    /// Look up an attribute of a resolved container.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(name),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

// --- Value nodes ------------------------------------------------------------

/// Shared, immutable handle to a node. Trees are built once and resolved many
/// times, possibly from several threads.
pub type NodeRef = Arc<Node>;

/// One node of a configuration space.
///
/// Decisions (`Choice`, `Integer`, `Fidelity`) consult the sampler. The other
/// variants only shape the tree.
#[derive(Debug)]
pub enum Node {
    /// A fixed value, typically one option of a `Choice`.
    Literal(Value),
    /// Positional group of nodes, resolved element-wise.
    Tuple(Vec<NodeRef>),
    Choice(Choice),
    Integer(IntegerRange),
    /// Re-entrant reference: every encounter is a fresh, independently
    /// addressed decision.
    Resampled(NodeRef),
    Operation(Operation),
    /// The controllable budget dimension.
    Fidelity(IntegerRange),
    Container(Container),
}

impl Node {
    pub fn literal(value: impl Into<Value>) -> NodeRef {
        Arc::new(Node::Literal(value.into()))
    }

    pub fn tuple(items: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::Tuple(items))
    }

    pub fn choice(options: Vec<NodeRef>) -> Result<NodeRef> {
        Ok(Arc::new(Node::Choice(Choice::new(options)?)))
    }

    pub fn integer(lo: i64, hi: i64) -> Result<NodeRef> {
        Ok(Arc::new(Node::Integer(IntegerRange::new(lo, hi)?)))
    }

    pub fn resampled(inner: &NodeRef) -> NodeRef {
        Arc::new(Node::Resampled(Arc::clone(inner)))
    }

    pub fn fidelity(range: IntegerRange) -> NodeRef {
        Arc::new(Node::Fidelity(range))
    }

    pub fn operation(operation: Operation) -> NodeRef {
        Arc::new(Node::Operation(operation))
    }

    pub fn container(container: Container) -> NodeRef {
        Arc::new(Node::Container(container))
    }

    /// Short kind name, used in path segments (`resampled_<kind>`).
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Literal(_) => "literal",
            Node::Tuple(_) => "tuple",
            Node::Choice(_) => "choice",
            Node::Integer(_) => "integer",
            Node::Resampled(_) => "resampled",
            Node::Operation(_) => "operation",
            Node::Fidelity(_) => "fidelity",
            Node::Container(_) => "container",
        }
    }
}

/// Choice over a fixed, ordered set of options. Index domain is `[0, N)`.
#[derive(Debug)]
pub struct Choice {
    options: Vec<NodeRef>,
}

impl Choice {
    pub fn new(options: Vec<NodeRef>) -> Result<Self> {
        if options.is_empty() {
            return Err(Error::InvalidConfig("a choice needs at least one option".into()));
        }
        Ok(Choice { options })
    }

    pub fn options(&self) -> &[NodeRef] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Inclusive integer range `[lo, hi]`, optionally sampled on a log scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerRange {
    pub lo: i64,
    pub hi: i64,
    pub log: bool,
}

impl IntegerRange {
    pub fn new(lo: i64, hi: i64) -> Result<Self> {
        if lo > hi {
            return Err(Error::InvalidConfig(format!("integer range [{lo}, {hi}] is empty")));
        }
        Ok(IntegerRange { lo, hi, log: false })
    }

    /// Log-uniform sampling needs a strictly positive lower bound.
    pub fn log_scale(lo: i64, hi: i64) -> Result<Self> {
        let range = IntegerRange::new(lo, hi)?;
        if lo < 1 {
            return Err(Error::InvalidConfig(format!("log-scale range [{lo}, {hi}] must start at 1 or above")));
        }
        Ok(IntegerRange { log: true, ..range })
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.lo..=self.hi).contains(&value)
    }
}

pub(crate) type OperatorFn = dyn Fn(&[Value], &Kwargs) -> Result<Value> + Send + Sync;

/// Pure transformation applied to resolved operands.
#[derive(Clone)]
pub struct Operator {
    pub name: &'static str,
    apply: Arc<OperatorFn>,
}

impl Operator {
    pub fn new(name: &'static str, apply: impl Fn(&[Value], &Kwargs) -> Result<Value> + Send + Sync + 'static) -> Self {
        Operator { name, apply: Arc::new(apply) }
    }

    pub fn apply(&self, args: &[Value], kwargs: &Kwargs) -> Result<Value> {
        (self.apply)(args, kwargs)
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator").field("name", &self.name).field("apply", &"<function>").finish()
    }
}

/// Composite operation: resolve `args` and `kwargs`, then apply `operator`.
///
/// A resolved `args` tuple is spread into positional arguments; any other
/// resolved value becomes the single positional argument.
#[derive(Debug)]
pub struct Operation {
    pub operator: Operator,
    pub args: NodeRef,
    pub kwargs: Vec<(String, NodeRef)>,
}

impl Operation {
    pub fn new(operator: Operator, args: NodeRef) -> Self {
        Operation { operator, args, kwargs: Vec::new() }
    }

    pub fn kwarg(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.kwargs.push((name.into(), node));
        self
    }
}

/// Named group of nodes; attribute order is declaration order.
#[derive(Debug, Default)]
pub struct Container {
    entries: Vec<(String, NodeRef)>,
}

impl Container {
    pub fn new() -> Self {
        Container::default()
    }

    pub fn with(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.entries.push((name.into(), node));
        self
    }

    pub fn entries(&self) -> &[(String, NodeRef)] {
        &self.entries
    }
}
