use crate::model::Prior;
use crate::observation::GroupObservation;
use crate::simulation::{self, SimulationConfig};
use crate::stats::EffectSummary;
use anyhow::{bail, Result};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lower multiplier on the analytic seed where the search interval starts.
pub const DEFAULT_LOW_FACTOR: f64 = 0.7;
/// Upper multiplier on the analytic seed where the search interval starts.
pub const DEFAULT_HIGH_FACTOR: f64 = 1.3;
/// Upper multiplier used instead when the seed itself misses the target.
pub const DEFAULT_UNDERSHOOT_HIGH_FACTOR: f64 = 2.0;
/// Bisection steps after the seed evaluation. Together with the baseline and the seed
/// this bounds the search to seven simulation runs.
pub const DEFAULT_SEARCH_ITERATIONS: usize = 5;
/// Draws per group for every candidate evaluated during the search. Lower than the
/// reporting count to keep the search fast, at the cost of noisier widths.
pub const DEFAULT_SEARCH_SIMULATIONS: usize = 50_000;
/// Additional sample sizes are rounded up to a multiple of this.
pub const DEFAULT_ROUNDING_STEP: u64 = 10;

/// Tuning of the sample-size search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub low_factor: f64,
    pub high_factor: f64,
    pub undershoot_high_factor: f64,
    pub iterations: usize,
    pub search_simulations: usize,
    pub rounding_step: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            low_factor: DEFAULT_LOW_FACTOR,
            high_factor: DEFAULT_HIGH_FACTOR,
            undershoot_high_factor: DEFAULT_UNDERSHOOT_HIGH_FACTOR,
            iterations: DEFAULT_SEARCH_ITERATIONS,
            search_simulations: DEFAULT_SEARCH_SIMULATIONS,
            rounding_step: DEFAULT_ROUNDING_STEP,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.low_factor > 0.0 && self.low_factor < self.high_factor) {
            bail!(
                "Search factors must satisfy 0 < low ({}) < high ({})",
                self.low_factor,
                self.high_factor
            );
        }
        if !(self.undershoot_high_factor >= self.high_factor
            && self.undershoot_high_factor.is_finite())
        {
            bail!(
                "Undershoot factor ({}) must be finite and at least the high factor ({})",
                self.undershoot_high_factor,
                self.high_factor
            );
        }
        if self.search_simulations == 0 {
            bail!("Number of search simulations must be positive");
        }
        if self.rounding_step == 0 {
            bail!("Rounding step must be positive");
        }
        Ok(())
    }
}

/// Additional observations per group expected to bring the relative-uplift interval
/// down to a target width.
///
/// `estimated_final_width` comes from a Monte Carlo run on synthetic data and is only
/// approximate. It may still exceed the target when the search did not converge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSizeEstimate {
    pub additional_a: u64,
    pub additional_b: u64,
    pub total_a: u64,
    pub total_b: u64,
    pub estimated_final_width: f64,
}

impl SampleSizeEstimate {
    fn unchanged(a: &GroupObservation, b: &GroupObservation, width: f64) -> Self {
        Self {
            additional_a: 0,
            additional_b: 0,
            total_a: a.total,
            total_b: b.total,
            estimated_final_width: width,
        }
    }

    pub fn needs_more_samples(&self) -> bool {
        self.additional_a > 0 || self.additional_b > 0
    }

    pub fn target_met(&self, target_width: f64) -> bool {
        self.estimated_final_width <= target_width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    additional_a: u64,
    additional_b: u64,
    width: f64,
}

/// Smallest multiple of `step` not below `value`.
pub fn round_up_to_multiple(value: u64, step: u64) -> Result<u64> {
    match value.div_ceil(step).checked_mul(step) {
        Some(rounded) => Ok(rounded),
        None => bail!("Cannot round {} up to a multiple of {}", value, step),
    }
}

/// `ceil(factor * count)`, failing when the result does not fit in a `u64`.
fn scaled(count: u64, factor: f64) -> Result<u64> {
    let value = (factor * count as f64).ceil();
    if !(value.is_finite() && value < u64::MAX as f64) {
        bail!(
            "Sample size {} x {} is too large to represent, the target width is unreachable",
            count,
            factor
        );
    }
    Ok(value.max(0.0) as u64)
}

/// Bounded bisection over a multiplier of the seed additions.
///
/// `test_width` is called once for the seed and once per iteration. A midpoint replaces
/// the best candidate only if its width is both smaller and strictly closer to the target.
fn refine_seed<F>(
    seed_a: u64,
    seed_b: u64,
    target_width: f64,
    search_config: &SearchConfig,
    mut test_width: F,
) -> Result<Candidate>
where
    F: FnMut(u64, u64) -> Result<f64>,
{
    let mut low_factor = search_config.low_factor;
    let mut high_factor = search_config.high_factor;
    let mut best = Candidate {
        additional_a: seed_a,
        additional_b: seed_b,
        width: test_width(seed_a, seed_b)?,
    };
    debug!("Seed width: {:.3}%", best.width);
    if best.width > target_width {
        high_factor = search_config.undershoot_high_factor;
        debug!(
            "Seed undershoots the target, widening upper factor to {}",
            high_factor
        );
    }

    for iteration in 0..search_config.iterations {
        let mid_factor = (low_factor + high_factor) / 2.0;
        let mid_a = scaled(seed_a, mid_factor)?;
        let mid_b = scaled(seed_b, mid_factor)?;
        let width = test_width(mid_a, mid_b)?;
        debug!(
            "Iteration {}: factor {:.4}, A +{}, B +{}, width {:.3}%",
            iteration + 1,
            mid_factor,
            mid_a,
            mid_b,
            width
        );

        if width < best.width && (width - target_width).abs() < (best.width - target_width).abs() {
            best = Candidate {
                additional_a: mid_a,
                additional_b: mid_b,
                width,
            };
        }

        if width > target_width {
            low_factor = mid_factor;
        } else {
            high_factor = mid_factor;
        }
    }
    Ok(best)
}

/// Estimate how many more observations each group needs for the 95% interval of the
/// relative uplift to be at most `target_width` percentage points wide.
///
/// Future data is assumed to convert at the currently observed rates. Starting from the
/// inverse-square-root scaling of the interval width, a bounded bisection over a
/// multiplier of that seed refines the estimate with reduced-fidelity simulations.
/// A target so small that the required sample size overflows a `u64` is an error.
pub fn estimate_additional_samples<R: Rng + ?Sized>(
    a: &GroupObservation,
    b: &GroupObservation,
    target_width: f64,
    simulation_config: &SimulationConfig,
    search_config: &SearchConfig,
    rng: &mut R,
) -> Result<SampleSizeEstimate> {
    if !(target_width.is_finite() && target_width > 0.0) {
        bail!("Target width must be positive, got {}", target_width);
    }
    a.validate()?;
    b.validate()?;
    simulation_config.validate()?;
    search_config.validate()?;

    let current_width = simulation::evaluate(a, b, simulation_config, rng)?.ci_width;
    info!(
        "Current interval width: {:.2}%, target: {:.2}%",
        current_width, target_width
    );
    if current_width <= target_width {
        info!("Target width already reached, no additional samples needed");
        return Ok(SampleSizeEstimate::unchanged(a, b, current_width));
    }

    let scaling_factor = (current_width / target_width).powi(2);
    let seed_a = scaled(a.total, scaling_factor - 1.0)?;
    let seed_b = scaled(b.total, scaling_factor - 1.0)?;
    debug!(
        "Scaling factor {:.3}, seed: A +{}, B +{}",
        scaling_factor, seed_a, seed_b
    );

    let search_simulation = simulation_config.with_simulations(search_config.search_simulations);
    let test_width = |additional_a: u64, additional_b: u64| -> Result<f64> {
        let summary = simulation::evaluate(
            &a.augmented(additional_a)?,
            &b.augmented(additional_b)?,
            &search_simulation,
            &mut *rng,
        )?;
        Ok(summary.ci_width)
    };
    let best = refine_seed(seed_a, seed_b, target_width, search_config, test_width)?;

    if best.width > target_width {
        warn!(
            "Search did not reach the target width, best estimate is {:.2}% (target {:.2}%)",
            best.width, target_width
        );
    }

    let additional_a = round_up_to_multiple(best.additional_a, search_config.rounding_step)?;
    let additional_b = round_up_to_multiple(best.additional_b, search_config.rounding_step)?;
    let (Some(total_a), Some(total_b)) = (
        a.total.checked_add(additional_a),
        b.total.checked_add(additional_b),
    ) else {
        bail!(
            "Final sample sizes overflow with A +{} and B +{}",
            additional_a,
            additional_b
        );
    };
    info!(
        "Estimated additional samples: A +{}, B +{} (width ≈ {:.2}%)",
        additional_a, additional_b, best.width
    );
    Ok(SampleSizeEstimate {
        additional_a,
        additional_b,
        total_a,
        total_b,
        estimated_final_width: best.width,
    })
}

/// [`estimate_additional_samples`] on raw counts with the default simulation and
/// search settings.
#[allow(clippy::too_many_arguments)]
pub fn calculate_additional_sample_size<R: Rng + ?Sized>(
    a_successes: u64,
    a_total: u64,
    b_successes: u64,
    b_total: u64,
    target_width: f64,
    prior: Prior,
    rng: &mut R,
) -> Result<SampleSizeEstimate> {
    let a = GroupObservation::new(a_successes, a_total)?;
    let b = GroupObservation::new(b_successes, b_total)?;
    let simulation_config = SimulationConfig {
        prior,
        ..SimulationConfig::default()
    };
    estimate_additional_samples(
        &a,
        &b,
        target_width,
        &simulation_config,
        &SearchConfig::default(),
        rng,
    )
}

/// Re-run the full simulation on both groups extended by the estimated additions.
pub fn verify_estimate<R: Rng + ?Sized>(
    a: &GroupObservation,
    b: &GroupObservation,
    estimate: &SampleSizeEstimate,
    simulation_config: &SimulationConfig,
    rng: &mut R,
) -> Result<EffectSummary> {
    let a_verified = a.augmented(estimate.additional_a)?;
    let b_verified = b.augmented(estimate.additional_b)?;
    info!("Verifying estimate with A = {}, B = {}", a_verified, b_verified);
    simulation::evaluate(&a_verified, &b_verified, simulation_config, rng)
}
