use anyhow::{bail, Result};
use log::warn;
use serde::Serialize;

/// Lower and upper percentiles bounding the reported 95% credible intervals
pub const CREDIBLE_INTERVAL_PERCENTILES: (f64, f64) = (2.5, 97.5);

/// Percentile `q` (0-100) of an ascending slice, interpolating linearly between the
/// two closest order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> Result<f64> {
    if sorted.is_empty() {
        bail!("Cannot compute percentile of an empty sequence");
    }
    if !(0.0..=100.0).contains(&q) {
        bail!("Percentile must be in [0, 100], got {}", q);
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        bail!("Cannot compute mean of an empty sequence");
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Central interval of `values` between the two given percentiles.
fn interval(values: &[f64], bounds: (f64, f64)) -> Result<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    Ok((percentile(&sorted, bounds.0)?, percentile(&sorted, bounds.1)?))
}

/// Effect-size statistics of a paired set of posterior draws. Percentage quantities are
/// scaled by 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSummary {
    pub a_conversion: f64,
    pub b_conversion: f64,
    pub abs_mean: f64,
    pub abs_ci_lower: f64,
    pub abs_ci_upper: f64,
    pub mean_uplift: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub ci_width: f64,
    pub prob_b_better: f64,
    pub expected_loss: f64,
    pub n_simulations: usize,
    /// Draws whose relative uplift was not finite and therefore left out of the uplift
    /// mean and interval.
    pub n_degenerate_draws: usize,
    #[serde(skip)]
    pub a_samples: Vec<f64>,
    #[serde(skip)]
    pub b_samples: Vec<f64>,
    #[serde(skip)]
    pub relative_uplift: Vec<f64>,
}

/// Reduce paired draws into an [`EffectSummary`].
///
/// The observed conversions are left at zero, the caller knows the counts.
/// Relative-uplift draws are `(b - a) / a`; any that are not finite (an `a` draw of
/// exactly zero, or so close to zero that the percentage overflows) are excluded from the
/// uplift statistics and counted instead.
pub fn summarize(a_samples: Vec<f64>, b_samples: Vec<f64>) -> Result<EffectSummary> {
    if a_samples.is_empty() {
        bail!("Cannot summarize an empty set of posterior draws");
    }
    if a_samples.len() != b_samples.len() {
        bail!(
            "Posterior draws must be paired, got {} draws for A and {} for B",
            a_samples.len(),
            b_samples.len()
        );
    }
    let n = a_samples.len();

    let abs_diff: Vec<f64> = a_samples
        .iter()
        .zip(b_samples.iter())
        .map(|(a, b)| (b - a) * 100.0)
        .collect();
    let abs_mean = mean(&abs_diff)?;
    let (abs_ci_lower, abs_ci_upper) = interval(&abs_diff, CREDIBLE_INTERVAL_PERCENTILES)?;

    // a huge finite ratio can still overflow once scaled to percent
    let (relative_uplift, uplift_pct): (Vec<f64>, Vec<f64>) = a_samples
        .iter()
        .zip(b_samples.iter())
        .map(|(a, b)| (b - a) / a)
        .map(|uplift| (uplift, uplift * 100.0))
        .filter(|(_, pct)| pct.is_finite())
        .unzip();
    let n_degenerate_draws = n - relative_uplift.len();
    if relative_uplift.is_empty() {
        bail!("Relative uplift is not finite for any draw, group A draws are all at or near zero");
    }
    if n_degenerate_draws > 0 {
        warn!(
            "Excluded {} of {} draws with a non-finite relative uplift",
            n_degenerate_draws, n
        );
    }
    let mean_uplift = mean(&uplift_pct)?;
    let (ci_lower, ci_upper) = interval(&uplift_pct, CREDIBLE_INTERVAL_PERCENTILES)?;

    let n_b_better = a_samples
        .iter()
        .zip(b_samples.iter())
        .filter(|(a, b)| b > a)
        .count();
    let expected_loss = a_samples
        .iter()
        .zip(b_samples.iter())
        .map(|(a, b)| (a - b).max(0.0))
        .sum::<f64>()
        / n as f64;

    Ok(EffectSummary {
        a_conversion: 0.0,
        b_conversion: 0.0,
        abs_mean,
        abs_ci_lower,
        abs_ci_upper,
        mean_uplift,
        ci_lower,
        ci_upper,
        ci_width: ci_upper - ci_lower,
        prob_b_better: n_b_better as f64 / n as f64,
        expected_loss,
        n_simulations: n,
        n_degenerate_draws,
        a_samples,
        b_samples,
        relative_uplift,
    })
}
