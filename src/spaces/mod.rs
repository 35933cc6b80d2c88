//! Concrete configuration spaces built on the engine.
//!
//! - [`program`]: register-machine optimizer programs with an epoch fidelity.

pub mod program;
