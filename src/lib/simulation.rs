use crate::model::Prior;
use crate::observation::GroupObservation;
use crate::stats::{self, EffectSummary};
use anyhow::{bail, Result};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Monte Carlo draws per group used for reporting and verification
pub const DEFAULT_N_SIMULATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_simulations: usize,
    pub prior: Prior,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_simulations: DEFAULT_N_SIMULATIONS,
            prior: Prior::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(n_simulations: usize, prior: Prior) -> Result<Self> {
        let config = Self {
            n_simulations,
            prior,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_simulations == 0 {
            bail!("Number of simulations must be positive");
        }
        self.prior.validate()
    }

    /// Same prior, different number of draws
    pub fn with_simulations(&self, n_simulations: usize) -> Self {
        Self {
            n_simulations,
            prior: self.prior,
        }
    }
}

/// Draw paired posterior samples for both groups and reduce them to effect statistics.
pub fn evaluate<R: Rng + ?Sized>(
    a: &GroupObservation,
    b: &GroupObservation,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<EffectSummary> {
    config.validate()?;
    a.validate()?;
    b.validate()?;
    debug!(
        "Evaluating A = {}, B = {} with {} simulations",
        a, b, config.n_simulations
    );
    let a_samples = config.prior.posterior(a).sample(config.n_simulations, rng)?;
    let b_samples = config.prior.posterior(b).sample(config.n_simulations, rng)?;

    let mut summary = stats::summarize(a_samples, b_samples)?;
    summary.a_conversion = a.rate();
    summary.b_conversion = b.rate();
    Ok(summary)
}

/// [`evaluate`] on raw counts and prior parameters.
#[allow(clippy::too_many_arguments)]
pub fn run_simulation<R: Rng + ?Sized>(
    a_successes: u64,
    a_total: u64,
    b_successes: u64,
    b_total: u64,
    n_simulations: usize,
    alpha_prior: f64,
    beta_prior: f64,
    rng: &mut R,
) -> Result<EffectSummary> {
    let a = GroupObservation::new(a_successes, a_total)?;
    let b = GroupObservation::new(b_successes, b_total)?;
    let config = SimulationConfig::new(n_simulations, Prior::new(alpha_prior, beta_prior)?)?;
    evaluate(&a, &b, &config, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn observations(a: (u64, u64), b: (u64, u64)) -> (GroupObservation, GroupObservation) {
        (
            GroupObservation::new(a.0, a.1).unwrap(),
            GroupObservation::new(b.0, b.1).unwrap(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.n_simulations, 100_000);
        assert_eq!(config.prior, Prior::default());
    }

    #[test]
    fn test_config_error() {
        assert!(SimulationConfig::new(0, Prior::default()).is_err());
        let invalid_prior = Prior { alpha: -1.0, beta: 1.0 };
        assert!(SimulationConfig::new(10, invalid_prior).is_err());
    }

    #[test]
    fn test_evaluate_reference_experiment() {
        let (a, b) = observations((54, 92), (66, 93));
        let mut rng = StdRng::seed_from_u64(42);
        let summary = evaluate(&a, &b, &SimulationConfig::default(), &mut rng).unwrap();

        assert!((summary.a_conversion - 54.0 / 92.0).abs() < 1e-12);
        assert!((summary.b_conversion - 66.0 / 93.0).abs() < 1e-12);
        assert!(summary.prob_b_better > 0.9);
        assert!(summary.mean_uplift > 0.0);
        assert!(summary.abs_ci_lower < summary.abs_mean && summary.abs_mean < summary.abs_ci_upper);
        assert!(summary.ci_width > 8.0);
        assert!(summary.expected_loss >= 0.0 && summary.expected_loss < 0.01);
        assert_eq!(summary.a_samples.len(), 100_000);
        assert_eq!(summary.b_samples.len(), 100_000);
    }

    #[test]
    fn test_evaluate_is_deterministic_for_seed() {
        let (a, b) = observations((54, 92), (66, 93));
        let config = SimulationConfig::default().with_simulations(5_000);
        let first = evaluate(&a, &b, &config, &mut StdRng::seed_from_u64(9)).unwrap();
        let second = evaluate(&a, &b, &config, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prob_b_better_increases_with_b_successes() {
        let config = SimulationConfig::default();
        let mut previous = 0.0;
        for b_successes in vec![40, 54, 66, 80] {
            let (a, b) = observations((54, 92), (b_successes, 93));
            let mut rng = StdRng::seed_from_u64(2024);
            let summary = evaluate(&a, &b, &config, &mut rng).unwrap();
            assert!(
                summary.prob_b_better + 0.01 >= previous,
                "prob_b_better dropped from {} to {} at {} successes",
                previous,
                summary.prob_b_better,
                b_successes
            );
            previous = summary.prob_b_better;
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn test_width_scales_with_inverse_square_root() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = SimulationConfig::default();
        let (a, b) = observations((54, 92), (66, 93));
        let small = evaluate(&a, &b, &config, &mut rng).unwrap();
        let (a, b) = observations((108, 184), (132, 186));
        let large = evaluate(&a, &b, &config, &mut rng).unwrap();

        let ratio = small.ci_width / large.ci_width;
        assert!(
            (ratio - 2.0_f64.sqrt()).abs() < 0.15,
            "width ratio {} not close to sqrt(2)",
            ratio
        );
    }

    #[test]
    fn test_single_failed_trial_does_not_crash() {
        let (a, b) = observations((0, 1), (1, 2));
        let mut rng = StdRng::seed_from_u64(1);
        let config = SimulationConfig::default().with_simulations(10_000);
        let summary = evaluate(&a, &b, &config, &mut rng).unwrap();
        assert!(summary.a_samples.iter().all(|&x| (0.0..=1.0).contains(&x)));
        assert!(summary.ci_width.is_finite());
    }

    #[test]
    fn test_run_simulation_validates_counts() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(run_simulation(5, 0, 1, 10, 100, 1.0, 1.0, &mut rng).is_err());
        assert!(run_simulation(11, 10, 1, 10, 100, 1.0, 1.0, &mut rng).is_err());
        assert!(run_simulation(1, 10, 1, 10, 100, 0.0, 1.0, &mut rng).is_err());
        assert!(run_simulation(1, 10, 1, 10, 0, 1.0, 1.0, &mut rng).is_err());
        assert!(run_simulation(1, 10, 1, 10, 100, 1.0, 1.0, &mut rng).is_ok());
    }
}
