use crate::observation::GroupObservation;
use anyhow::{anyhow, bail, Result};
use log::debug;
use rand::Rng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;
use statrs::function::gamma::ln_gamma;

/// Beta prior shared by both groups of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for Prior {
    /// Uniform prior, alpha=1.0, beta=1.0
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl Prior {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        let prior = Self { alpha, beta };
        prior.validate()?;
        Ok(prior)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            bail!("Prior alpha must be positive, got {}", self.alpha);
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            bail!("Prior beta must be positive, got {}", self.beta);
        }
        Ok(())
    }

    /// Conjugate update of the prior with the successes and failures of `observation`
    pub fn posterior(&self, observation: &GroupObservation) -> BetaPosterior {
        let mut posterior = BetaPosterior::new(self.alpha, self.beta);
        posterior.update(observation.successes, observation.failures());
        posterior
    }
}

/// Beta posterior over the conversion rate of a single group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Update parameters with `n_success` successes and `n_failure` failures
    pub fn update(&mut self, n_success: u64, n_failure: u64) {
        self.alpha += n_success as f64;
        self.beta += n_failure as f64;
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let numerator = self.alpha * self.beta;
        let denominator = (self.alpha + self.beta).powf(2.0) * (self.alpha + self.beta + 1.0);
        numerator / denominator
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn log_beta(&self) -> f64 {
        ln_gamma(self.alpha) + ln_gamma(self.beta) - ln_gamma(self.alpha + self.beta)
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        if x < 0.0 || x > 1.0 {
            return f64::NEG_INFINITY;
        }
        // 0 * ln(0) is taken as 0 so the density is finite at the edges when alpha or beta is 1
        let term = |exponent: f64, v: f64| if exponent == 0.0 { 0.0 } else { exponent * v.ln() };
        term(self.alpha - 1.0, x) + term(self.beta - 1.0, 1.0 - x) - self.log_beta()
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if x < 0.0 || x > 1.0 {
            return 0.0;
        }
        self.log_pdf(x).exp()
    }

    /// Exact equal-tailed credible interval holding `level` of the posterior mass.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        if !(level > 0.0 && level < 1.0) {
            bail!("Credible level must be in (0, 1), got {}", level);
        }
        let dist = statrs::distribution::Beta::new(self.alpha, self.beta)
            .map_err(|e| anyhow!("Invalid Beta({}, {}): {}", self.alpha, self.beta, e))?;
        let tail = (1.0 - level) / 2.0;
        Ok((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
    }

    /// Draw `n` independent samples from the posterior.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let dist = rand_distr::Beta::new(self.alpha, self.beta)
            .map_err(|e| anyhow!("Invalid Beta({}, {}): {}", self.alpha, self.beta, e))?;
        debug!(
            "Drawing {} samples from Beta(α = {:.3}, β = {:.3})",
            n, self.alpha, self.beta
        );
        Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
    }
}
