//! Resolution errors.
//!
//! None of these are retried internally. They propagate to the caller, which
//! decides whether to skip a configuration or abort the run.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A value lies outside the legal index set or range of a node.
    #[error("value {value} for `{key}` is outside {domain}")]
    Domain { key: String, value: i64, domain: String },

    /// Override entries that no visited decision consumed.
    #[error("override entries do not match any visited decision: {keys:?}")]
    KeyMismatch { keys: Vec<String> },

    /// Exact replay reached a decision the table does not pin.
    #[error("no override for `{key}` during exact replay")]
    MissingOverride { key: String },

    /// An override entry addresses a live decision but describes another shape.
    #[error("override for `{path}` describes `{found}`, but the space defines `{expected}`")]
    ShapeMismatch { path: String, expected: String, found: String },

    /// A function received a different number of operands than its arity.
    #[error("function `{function}` takes {expected} operand(s), got {found}")]
    Arity { function: String, expected: usize, found: usize },

    /// An override table built under the other program length policy.
    #[error("override table was built under the {found} policy, space uses {expected}")]
    StructuralPolicyMismatch { expected: String, found: String },

    #[error("malformed override key `{0}`")]
    InvalidKey(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operator received resolved operands of the wrong kind.
    #[error("operator `{operator}` failed: {message}")]
    Operator { operator: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn operator(operator: &str, message: impl Into<String>) -> Self {
        Error::Operator { operator: operator.to_string(), message: message.into() }
    }
}
