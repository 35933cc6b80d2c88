//! Register-machine optimizer program space.
//!
//! A sample from this space is a short program over three slot ranges
//! (parameters, constants, variables) plus an optional training budget
//! (`epochs`). Every instruction is a fresh draw of the same template:
//!
//! ```text
//! program  = assemble_program(instructions...)
//! instr    = write_instruction(signature..., store = variable)
//! signature ∈ { (unary, ptr), (binary, ptr, ptr), (ternary, ptr, ptr, ptr) }
//! ptr      ∈ { parameter, constant, variable }
//! ```
//!
//! How many instructions there are depends on the [`LengthPolicy`]. The two
//! policies produce the same family of programs but address their decisions
//! differently, so their traces are not interchangeable.

mod builder;
mod compiler;

#[cfg(test)]
mod tests;

pub use compiler::{assemble_program, write_instruction};

use crate::api::{self, Space};
use crate::engine::{
    OverrideSampler, OverrideTable, RandomSampler, ResolutionTrace, ResolveMetrics, Sampler, TraceRecord,
};
use crate::error::{Error, Result};
use crate::program::{BinaryOp, Program, TernaryOp, UnaryOp};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SPACE_NAME: &str = "program";
pub const FIDELITY_NAME: &str = "epochs";

pub const DEFAULT_MAX_PROGRAM_LENGTH: usize = 20;
pub const DEFAULT_MAX_EPOCHS: i64 = 20;
pub const DEFAULT_VARIABLE_SLOTS: u8 = 11;

const MAX_PROGRAM_LENGTH_LIMIT: usize = 64;
const MAX_VARIABLE_SLOTS: u8 = u8::MAX - crate::program::FIRST_VARIABLE_SLOT + 1;

/// How the number of instructions is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPolicy {
    /// One choice over `1..=max` instructions.
    #[default]
    VariableLength,
    /// Always `max` instructions, truncated by an `n_lines` integer.
    FixedLength,
}

impl LengthPolicy {
    pub fn name(self) -> &'static str {
        match self {
            LengthPolicy::VariableLength => "variable_length",
            LengthPolicy::FixedLength => "fixed_length",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "variable_length" | "variable" => Some(LengthPolicy::VariableLength),
            "fixed_length" | "fixed" => Some(LengthPolicy::FixedLength),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            LengthPolicy::VariableLength => LengthPolicy::FixedLength,
            LengthPolicy::FixedLength => LengthPolicy::VariableLength,
        }
    }

    /// Path prefix shared by every instruction key under this policy.
    pub(crate) fn key_prefix(self) -> &'static str {
        match self {
            LengthPolicy::VariableLength => "space.program.args.resampled_choice",
            LengthPolicy::FixedLength => "space.program.args[",
        }
    }
}

bitflags::bitflags! {
    /// Instruction signatures the space may draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ArityMask: u8 {
        const UNARY   = 1 << 0;
        const BINARY  = 1 << 1;
        const TERNARY = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Slot ranges an operand pointer may address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PointerKinds: u8 {
        const PARAMETER = 1 << 0;
        const CONSTANT  = 1 << 1;
        const VARIABLE  = 1 << 2;
    }
}

/// Shape of a [`ProgramSpace`]. Callers own their copy; nothing is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub max_program_length: usize,
    pub max_epochs_per_config: i64,
    pub variable_slots: u8,
    /// Inclusive constant slot range, within `3..=8`.
    pub constants: [u8; 2],
    pub epoch_fidelity: bool,
    pub policy: LengthPolicy,
    pub arities: ArityMask,
    pub pointer_kinds: PointerKinds,
    pub unary: Vec<UnaryOp>,
    pub binary: Vec<BinaryOp>,
    pub ternary: Vec<TernaryOp>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        SpaceConfig {
            max_program_length: DEFAULT_MAX_PROGRAM_LENGTH,
            max_epochs_per_config: DEFAULT_MAX_EPOCHS,
            variable_slots: DEFAULT_VARIABLE_SLOTS,
            constants: [*crate::program::CONSTANT_SLOTS.start(), *crate::program::CONSTANT_SLOTS.end()],
            epoch_fidelity: true,
            policy: LengthPolicy::VariableLength,
            arities: ArityMask::all(),
            pointer_kinds: PointerKinds::all(),
            unary: UnaryOp::ALL.to_vec(),
            binary: BinaryOp::ALL.to_vec(),
            ternary: TernaryOp::ALL.to_vec(),
        }
    }
}

impl SpaceConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SpaceConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if !(1..=MAX_PROGRAM_LENGTH_LIMIT).contains(&self.max_program_length) {
            return invalid(format!(
                "max_program_length {} is outside [1, {MAX_PROGRAM_LENGTH_LIMIT}]",
                self.max_program_length
            ));
        }
        if self.max_epochs_per_config < 1 {
            return invalid(format!("max_epochs_per_config {} must be at least 1", self.max_epochs_per_config));
        }
        if !(1..=MAX_VARIABLE_SLOTS).contains(&self.variable_slots) {
            return invalid(format!("variable_slots {} is outside [1, {MAX_VARIABLE_SLOTS}]", self.variable_slots));
        }
        let [lo, hi] = self.constants;
        if lo > hi || !crate::program::CONSTANT_SLOTS.contains(&lo) || !crate::program::CONSTANT_SLOTS.contains(&hi) {
            return invalid(format!("constants [{lo}, {hi}] must be an ordered range within [3, 8]"));
        }
        if self.arities.is_empty() {
            return invalid("at least one instruction arity must be enabled".into());
        }
        if self.pointer_kinds.is_empty() {
            return invalid("at least one pointer kind must be enabled".into());
        }

        let catalogues = [
            (ArityMask::UNARY, self.unary.is_empty(), "unary"),
            (ArityMask::BINARY, self.binary.is_empty(), "binary"),
            (ArityMask::TERNARY, self.ternary.is_empty(), "ternary"),
        ];
        for (arity, empty, label) in catalogues {
            if self.arities.contains(arity) && empty {
                return invalid(format!("{label} instructions are enabled but no {label} function is listed"));
            }
        }
        Ok(())
    }
}

/// Outcome of resolving a [`ProgramSpace`].
#[derive(Debug, Clone)]
pub struct ProgramResolution {
    pub program: Program,
    /// Resolved training budget, absent when the space has no fidelity.
    pub epochs: Option<i64>,
    pub trace: ResolutionTrace,
    pub metrics: ResolveMetrics,
}

/// An immutable program space. Safe to share across threads; every
/// resolution brings its own sampler.
#[derive(Debug, Clone)]
pub struct ProgramSpace {
    config: SpaceConfig,
    space: Space,
}

impl ProgramSpace {
    pub fn new(config: SpaceConfig) -> Result<Self> {
        config.validate()?;
        let space = builder::build(&config)?;
        debug!(
            policy = config.policy.name(),
            max_program_length = config.max_program_length,
            variable_slots = config.variable_slots,
            epoch_fidelity = config.epoch_fidelity,
            "program space built"
        );
        Ok(ProgramSpace { config, space })
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn policy(&self) -> LengthPolicy {
        self.config.policy
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn resolve(&self, sampler: &mut dyn Sampler) -> Result<ProgramResolution> {
        let resolution = api::resolve(&self.space, sampler).map_err(|err| self.explain_mismatch(err))?;

        let program = resolution
            .attribute("program")
            .and_then(|value| value.as_program())
            .cloned()
            .ok_or_else(|| Error::operator("assemble_program", "space root did not resolve to a program"))?;

        Ok(ProgramResolution {
            program,
            epochs: resolution.fidelity_value(),
            trace: resolution.trace,
            metrics: resolution.metrics,
        })
    }

    /// Draw a program purely at random.
    pub fn sample(&self, seed: u64) -> Result<ProgramResolution> {
        self.resolve(&mut RandomSampler::seeded(seed))
    }

    /// Replay `table`; decisions it leaves open are drawn from `seed`.
    pub fn replay_table(&self, table: &OverrideTable, seed: u64) -> Result<ProgramResolution> {
        let mut sampler = OverrideSampler::new(table, RandomSampler::seeded(seed))?;
        self.resolve(&mut sampler)
    }

    /// Rebuild exactly the program `record` describes. Every decision the
    /// space visits must be pinned; a missing entry is
    /// [`Error::MissingOverride`], never a random draw.
    pub fn replay(&self, record: &TraceRecord) -> Result<ProgramResolution> {
        self.check_policy(record)?;
        let mut sampler = OverrideSampler::strict(&record.overrides())?;
        self.resolve(&mut sampler)
    }

    /// Replay `record` as a partial override; open decisions come from `seed`.
    pub fn replay_partial(&self, record: &TraceRecord, seed: u64) -> Result<ProgramResolution> {
        self.check_policy(record)?;
        self.replay_table(&record.overrides(), seed)
    }

    /// Refuse records tagged with, or keyed by, the other length policy.
    fn check_policy(&self, record: &TraceRecord) -> Result<()> {
        let expected = self.config.policy;
        let found = match record.policy.as_deref() {
            Some(name) => LengthPolicy::from_name(name)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown length policy `{name}` in trace record")))?,
            None if record.samplings.keys().any(|key| key.starts_with(expected.other().key_prefix())) => {
                expected.other()
            }
            None => expected,
        };
        if found != expected {
            return Err(Error::StructuralPolicyMismatch {
                expected: expected.name().to_string(),
                found: found.name().to_string(),
            });
        }
        Ok(())
    }

    /// Persistable record of `trace`, tagged with this space's policy.
    pub fn record(&self, trace: &ResolutionTrace) -> TraceRecord {
        TraceRecord::new(self.space.name(), Some(self.config.policy.name().to_string()), trace)
    }

    /// Unused keys written under the other policy mean the table was built
    /// for a structurally different space.
    fn explain_mismatch(&self, err: Error) -> Error {
        match err {
            Error::KeyMismatch { keys } => {
                let other = self.config.policy.other();
                if keys.iter().any(|key| key.starts_with(other.key_prefix())) {
                    Error::StructuralPolicyMismatch {
                        expected: self.config.policy.name().to_string(),
                        found: other.name().to_string(),
                    }
                } else {
                    Error::KeyMismatch { keys }
                }
            }
            other => other,
        }
    }
}
