//! Objective evaluation for resolved programs.
//!
//! The benchmark itself lives outside this crate. A driver supplies a
//! [`Benchmark`], and [`evaluate`] turns a [`ProgramResolution`] into a value
//! suitable for minimisation.

use crate::program::Program;
use crate::spaces::program::ProgramResolution;
use tracing::debug;

/// Scores an optimizer program after training for `epochs`.
///
/// Implementations must be pure with respect to `(program, epochs)`.
pub trait Benchmark {
    fn query(&self, program: &Program, epochs: i64) -> f64;
}

impl<F> Benchmark for F
where
    F: Fn(&Program, i64) -> f64,
{
    fn query(&self, program: &Program, epochs: i64) -> f64 {
        self(program, epochs)
    }
}

/// Map a raw benchmark score onto the minimisation objective. NaN (a diverged
/// or invalid program) ranks last.
pub fn objective_to_minimize(raw: f64) -> f64 {
    if raw.is_nan() { f64::INFINITY } else { raw }
}

/// Query `benchmark` with the resolved program at its resolved fidelity, or at
/// `default_epochs` when the space has none.
pub fn evaluate(benchmark: &dyn Benchmark, resolution: &ProgramResolution, default_epochs: i64) -> f64 {
    let epochs = resolution.epochs.unwrap_or(default_epochs);
    let raw = benchmark.query(&resolution.program, epochs);
    let objective = objective_to_minimize(raw);
    debug!(instructions = resolution.program.len(), epochs, raw, objective, "program evaluated");
    objective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spaces::program::{ProgramSpace, SpaceConfig};
    use std::cell::Cell;

    struct Recording {
        epochs: Cell<i64>,
        score: f64,
    }

    impl Benchmark for Recording {
        fn query(&self, _program: &Program, epochs: i64) -> f64 {
            self.epochs.set(epochs);
            self.score
        }
    }

    #[test]
    fn nan_becomes_worst_objective() {
        assert_eq!(objective_to_minimize(f64::NAN), f64::INFINITY);
        assert_eq!(objective_to_minimize(0.25), 0.25);
        assert_eq!(objective_to_minimize(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn resolved_fidelity_is_forwarded() {
        let space = ProgramSpace::new(SpaceConfig::default()).unwrap();
        let resolution = space.sample(6).unwrap();
        let bench = Recording { epochs: Cell::new(0), score: f64::NAN };

        assert_eq!(evaluate(&bench, &resolution, 99), f64::INFINITY);
        assert_eq!(Some(bench.epochs.get()), resolution.epochs);
    }

    #[test]
    fn default_epochs_apply_without_fidelity() {
        let space = ProgramSpace::new(SpaceConfig { epoch_fidelity: false, ..SpaceConfig::default() }).unwrap();
        let resolution = space.sample(6).unwrap();
        let bench = |program: &Program, epochs: i64| program.len() as f64 + epochs as f64;

        assert_eq!(evaluate(&bench, &resolution, 20), resolution.program.len() as f64 + 20.0);
    }
}
