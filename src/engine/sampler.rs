//! Sampling strategies.
//!
//! A [`Sampler`] turns one decision (its [`PathKey`]) into a raw value: an
//! option index for choices, an integer for ranges. The resolver validates
//! every returned value against the key's shape, so a custom sampler can
//! never smuggle an out-of-domain value into a program.
//!
//! Two strategies ship with the engine:
//!
//! - [`RandomSampler`]: uniform (or log-uniform) draws from a seedable RNG.
//! - [`OverrideSampler`]: replay from an [`OverrideTable`], falling back to a
//!   `RandomSampler` for anything the table does not pin. Built with
//!   [`OverrideSampler::strict`] it has no fallback and a miss is an error.
//!
//! ## Concurrency
//!
//! Samplers are `&mut` and owned by a single resolution. Parallel workers
//! each build their own, seeded independently.

use super::path::{PathKey, Shape};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Prefix of sampled decisions in the flat experiment config format.
pub const SAMPLING_PREFIX: &str = "SAMPLING__";
/// Prefix of environment (fidelity) values in the flat experiment config format.
pub const ENVIRONMENT_PREFIX: &str = "ENVIRONMENT__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleOrigin {
    Override,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub value: i64,
    pub origin: SampleOrigin,
}

pub trait Sampler {
    /// Produce a value for the decision named by `key`.
    fn sample(&mut self, key: &PathKey) -> Result<Sample>;

    /// Produce the fidelity value for the attribute `name`.
    fn sample_fidelity(&mut self, name: &str, key: &PathKey) -> Result<Sample>;

    /// Override entries that were never consumed. Checked once the walk is done.
    fn unused_overrides(&self) -> Vec<String> {
        Vec::new()
    }
}

// --- Random ------------------------------------------------------------------

/// Uniform sampler over an injected random source.
///
/// The default source is `ChaCha8Rng`, whose stream is stable across
/// platforms and releases, so seeds stay reproducible.
#[derive(Debug, Clone)]
pub struct RandomSampler<R = ChaCha8Rng> {
    rng: R,
}

impl RandomSampler<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        RandomSampler { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}

impl<R: Rng> RandomSampler<R> {
    pub fn from_rng(rng: R) -> Self {
        RandomSampler { rng }
    }

    fn draw(&mut self, shape: &Shape) -> i64 {
        match shape {
            Shape::Choice { options } => self.rng.gen_range(0..*options) as i64,
            Shape::Integer(range) if range.log => {
                // Log-uniform over [lo, hi + 1), floored back onto the integers.
                let lo = (range.lo as f64).ln();
                let hi = (range.hi as f64 + 1.0).ln();
                // Bounds this large collapse to one f64.
                if lo >= hi {
                    return range.lo;
                }
                let value = self.rng.gen_range(lo..hi).exp().floor() as i64;
                value.clamp(range.lo, range.hi)
            }
            Shape::Integer(range) => self.rng.gen_range(range.lo..=range.hi),
        }
    }
}

impl<R: Rng> Sampler for RandomSampler<R> {
    fn sample(&mut self, key: &PathKey) -> Result<Sample> {
        Ok(Sample { value: self.draw(&key.shape), origin: SampleOrigin::Random })
    }

    fn sample_fidelity(&mut self, _name: &str, key: &PathKey) -> Result<Sample> {
        self.sample(key)
    }
}

// --- Override table ------------------------------------------------------------

/// Canonical key → literal value, plus environment values by attribute name.
///
/// This is the unit of exact replay and of partial, hand-authored overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTable {
    #[serde(default)]
    pub samplings: IndexMap<String, i64>,
    #[serde(default)]
    pub environment: IndexMap<String, i64>,
}

impl OverrideTable {
    pub fn new() -> Self {
        OverrideTable::default()
    }

    pub fn with_sampling(mut self, key: impl Into<String>, value: i64) -> Self {
        self.samplings.insert(key.into(), value);
        self
    }

    pub fn with_environment(mut self, name: impl Into<String>, value: i64) -> Self {
        self.environment.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.samplings.is_empty() && self.environment.is_empty()
    }

    /// Read the flat experiment config format.
    ///
    /// `SAMPLING__<key>` entries become samplings, `ENVIRONMENT__<name>`
    /// entries become environment values; unprefixed entries are samplings.
    pub fn from_prefixed(flat: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut table = OverrideTable::new();
        for (key, value) in flat {
            let value = value
                .as_i64()
                .ok_or_else(|| Error::InvalidConfig(format!("override `{key}` is not an integer: {value}")))?;
            if let Some(name) = key.strip_prefix(ENVIRONMENT_PREFIX) {
                table.environment.insert(name.to_string(), value);
            } else {
                let key = key.strip_prefix(SAMPLING_PREFIX).unwrap_or(key);
                table.samplings.insert(key.to_string(), value);
            }
        }
        Ok(table)
    }
}

// --- Override with fallback ------------------------------------------------------

#[derive(Debug, Clone)]
struct Pinned {
    key: String,
    shape: Shape,
    value: i64,
    consumed: bool,
}

/// Replays pinned values and delegates everything else to a fallback sampler.
///
/// Entries are matched by path. An entry whose shape differs from the live
/// decision is a [`Error::ShapeMismatch`]; a pinned value outside the domain
/// is an [`Error::Domain`]. Neither is ever clamped or skipped. Without a
/// fallback, a decision the table does not pin is [`Error::MissingOverride`].
#[derive(Debug, Clone)]
pub struct OverrideSampler<R = ChaCha8Rng> {
    pinned: IndexMap<String, Pinned>,
    environment: IndexMap<String, (i64, bool)>,
    fallback: Option<RandomSampler<R>>,
}

impl OverrideSampler<ChaCha8Rng> {
    /// Exact replay: every visited decision must be pinned by `table`.
    pub fn strict(table: &OverrideTable) -> Result<Self> {
        OverrideSampler::build(table, None)
    }
}

impl<R: Rng> OverrideSampler<R> {
    pub fn new(table: &OverrideTable, fallback: RandomSampler<R>) -> Result<Self> {
        OverrideSampler::build(table, Some(fallback))
    }

    fn build(table: &OverrideTable, fallback: Option<RandomSampler<R>>) -> Result<Self> {
        let mut pinned = IndexMap::with_capacity(table.samplings.len());
        for (key, value) in &table.samplings {
            let parsed = PathKey::parse(key)?;
            let entry = Pinned { key: key.clone(), shape: parsed.shape, value: *value, consumed: false };
            if let Some(previous) = pinned.insert(parsed.path, entry) {
                return Err(Error::InvalidConfig(format!("override `{key}` repeats the path of `{}`", previous.key)));
            }
        }
        let environment = table.environment.iter().map(|(name, value)| (name.clone(), (*value, false))).collect();
        Ok(OverrideSampler { pinned, environment, fallback })
    }

    pub fn is_strict(&self) -> bool {
        self.fallback.is_none()
    }
}

impl<R: Rng> Sampler for OverrideSampler<R> {
    fn sample(&mut self, key: &PathKey) -> Result<Sample> {
        let Some(entry) = self.pinned.get_mut(&key.path) else {
            return match &mut self.fallback {
                Some(fallback) => fallback.sample(key),
                None => Err(Error::MissingOverride { key: key.to_string() }),
            };
        };
        if entry.shape != key.shape {
            return Err(Error::ShapeMismatch {
                path: key.path.clone(),
                expected: key.shape.to_string(),
                found: entry.shape.to_string(),
            });
        }
        if !key.shape.contains(entry.value) {
            return Err(Error::Domain { key: entry.key.clone(), value: entry.value, domain: key.shape.domain() });
        }
        entry.consumed = true;
        Ok(Sample { value: entry.value, origin: SampleOrigin::Override })
    }

    fn sample_fidelity(&mut self, name: &str, key: &PathKey) -> Result<Sample> {
        let Some((value, consumed)) = self.environment.get_mut(name) else {
            return match &mut self.fallback {
                Some(fallback) => fallback.sample_fidelity(name, key),
                None => Err(Error::MissingOverride { key: format!("{ENVIRONMENT_PREFIX}{name}") }),
            };
        };
        if !key.shape.contains(*value) {
            return Err(Error::Domain { key: name.to_string(), value: *value, domain: key.shape.domain() });
        }
        *consumed = true;
        Ok(Sample { value: *value, origin: SampleOrigin::Override })
    }

    fn unused_overrides(&self) -> Vec<String> {
        let samplings = self.pinned.values().filter(|p| !p.consumed).map(|p| p.key.clone());
        let environment =
            self.environment.iter().filter(|(_, (_, consumed))| !consumed).map(|(name, _)| format!("{ENVIRONMENT_PREFIX}{name}"));
        samplings.chain(environment).collect()
    }
}
