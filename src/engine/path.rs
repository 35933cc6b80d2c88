//! Canonical path keys.
//!
//! Every decision reached during a resolution pass is named by a key of the
//! form `<path>::<shape>`:
//!
//! ```text
//! space.program.args.resampled_choice::choice__20
//! └──────────── path ───────────────┘  └─ shape ─┘
//! ```
//!
//! The path records how the resolver got there:
//!
//! | step                         | segment               |
//! |------------------------------|-----------------------|
//! | container attribute `name`   | `.name`               |
//! | tuple element `i`            | `[i]`                 |
//! | operation positional operand | `.args`               |
//! | operation named operand `k`  | `.kwargs{k}`          |
//! | re-entrant wrapper           | `.resampled_<kind>`   |
//! | chosen option of a choice    | `.chosen`             |
//!
//! The shape records the distribution (`choice__N`, `integer__lo_hi_log`), so a
//! hand-written override table is self-describing and can be checked against
//! the live space.
//!
//! ## Invariants
//!
//! - Two decisions at different structural positions never share a path.
//!   Re-entrant operands of one instruction differ by their tuple index.
//! - The same decision in the same tree shape always gets the same key.

use crate::IntegerRange;
use crate::error::{Error, Result};
use std::fmt;

/// Path of the space root.
pub(crate) const ROOT: &str = "space";

/// One navigation step, appended to the current path.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Segment<'a> {
    Attr(&'a str),
    Index(usize),
    Args,
    Kwarg(&'a str),
    Resampled(&'static str),
    Chosen,
}

impl Segment<'_> {
    pub(crate) fn append_to(self, path: &str) -> String {
        match self {
            Segment::Attr(name) => format!("{path}.{name}"),
            Segment::Index(idx) => format!("{path}[{idx}]"),
            Segment::Args => format!("{path}.args"),
            Segment::Kwarg(name) => format!("{path}.kwargs{{{name}}}"),
            Segment::Resampled(kind) => format!("{path}.resampled_{kind}"),
            Segment::Chosen => format!("{path}.chosen"),
        }
    }
}

/// Distribution shape of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Choice { options: usize },
    Integer(IntegerRange),
}

impl Shape {
    pub fn contains(&self, value: i64) -> bool {
        match self {
            Shape::Choice { options } => value >= 0 && (value as u64) < *options as u64,
            Shape::Integer(range) => range.contains(value),
        }
    }

    /// Human-readable legal domain, used in error messages.
    pub fn domain(&self) -> String {
        match self {
            Shape::Choice { options } => format!("choice indices [0, {options})"),
            Shape::Integer(range) => format!("integers [{}, {}]", range.lo, range.hi),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Choice { options } => write!(f, "choice__{options}"),
            Shape::Integer(range) => write!(f, "integer__{}_{}_{}", range.lo, range.hi, range.log),
        }
    }
}

/// Canonical key of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub path: String,
    pub shape: Shape,
}

impl PathKey {
    pub fn new(path: impl Into<String>, shape: Shape) -> Self {
        PathKey { path: path.into(), shape }
    }

    /// Parse a key produced by `Display`.
    pub fn parse(key: &str) -> Result<Self> {
        let re = regex!(
            r"^(?P<path>.+?)::(?:choice__(?P<n>\d+)|integer__(?P<lo>-?\d+)_(?P<hi>-?\d+)_(?P<log>true|false))$"
        );
        let invalid = || Error::InvalidKey(key.to_string());
        let caps = re.captures(key).ok_or_else(invalid)?;
        let path = caps.name("path").ok_or_else(invalid)?.as_str().to_string();

        let shape = if let Some(n) = caps.name("n") {
            let options: usize = n.as_str().parse().map_err(|_| invalid())?;
            if options == 0 {
                return Err(invalid());
            }
            Shape::Choice { options }
        } else {
            let bound = |name: &str| -> Result<i64> {
                caps.name(name).ok_or_else(invalid)?.as_str().parse().map_err(|_| invalid())
            };
            let (lo, hi) = (bound("lo")?, bound("hi")?);
            let log = caps.name("log").map(|m| m.as_str() == "true").unwrap_or(false);
            if lo > hi {
                return Err(invalid());
            }
            Shape::Integer(IntegerRange { lo, hi, log })
        };

        Ok(PathKey { path, shape })
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.path, self.shape)
    }
}
