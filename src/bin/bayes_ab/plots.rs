use anyhow::{bail, Result};
use bayes_ab_utils::model::BetaPosterior;
use bayes_ab_utils::sample_size::SampleSizeEstimate;
use bayes_ab_utils::stats::{self, EffectSummary};
use itertools::{Itertools, MinMaxResult};
use log::{debug, info};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

pub const N_BINS: usize = 50;
const PLOT_SIZE: (u32, u32) = (1000, 600);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram over the range of `values`, the last bin closed on the right.
pub fn histogram(values: &[f64], n_bins: usize) -> Result<Vec<Bin>> {
    if n_bins == 0 {
        bail!("Histogram needs at least one bin");
    }
    let (min, max) = match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => bail!("Cannot build a histogram of no values"),
        MinMaxResult::OneElement(x) => (x - 0.5, x + 0.5),
        MinMaxResult::MinMax(min, max) if min == max => (min - 0.5, max + 0.5),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let width = (max - min) / n_bins as f64;
    let mut counts = vec![0usize; n_bins];
    for &value in values {
        let index = (((value - min) / width) as usize).min(n_bins - 1);
        counts[index] += 1;
    }
    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count,
        })
        .collect())
}

fn max_count(bins: &[Bin]) -> f64 {
    bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64
}

pub fn uplift_distribution_plot(results: &EffectSummary, path: &Path) -> Result<()> {
    let uplift_pct: Vec<f64> = results.relative_uplift.iter().map(|u| u * 100.0).collect();
    let bins = histogram(&uplift_pct, N_BINS)?;
    let x_range = bins[0].start..bins[bins.len() - 1].end;
    let y_max = max_count(&bins) * 1.1;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Relative Uplift Distribution (Width: {:.2}%)", results.ci_width),
            ("sans-serif", 24),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Relative Uplift (%)")
        .y_desc("Frequency")
        .draw()?;

    chart.draw_series(std::iter::once(Rectangle::new(
        [(results.ci_lower, 0.0), (results.ci_upper, y_max)],
        RED.mix(0.15).filled(),
    )))?;
    chart.draw_series(bins.iter().map(|bin| {
        Rectangle::new([(bin.start, 0.0), (bin.end, bin.count as f64)], GREEN.mix(0.6).filled())
    }))?;
    chart
        .draw_series(LineSeries::new(
            vec![(results.mean_uplift, 0.0), (results.mean_uplift, y_max)],
            GREEN.stroke_width(2),
        ))?
        .label(format!("Mean: {:.2}%", results.mean_uplift))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));
    chart
        .draw_series(
            [results.ci_lower, results.ci_upper]
                .into_iter()
                .map(|x| PathElement::new(vec![(x, 0.0), (x, y_max)], RED.stroke_width(2))),
        )?
        .label(format!(
            "95% CI: [{:.2}%, {:.2}%]",
            results.ci_lower, results.ci_upper
        ))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (0.0, y_max)],
        BLACK.mix(0.3).stroke_width(1),
    )))?;
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Posterior density scaled to the expected bin counts of a histogram of `n` draws.
fn density_curve(posterior: &BetaPosterior, n: usize, bins: &[Bin]) -> Vec<(f64, f64)> {
    let bin_width = bins[0].end - bins[0].start;
    let (start, end) = (bins[0].start, bins[bins.len() - 1].end);
    (0..=200)
        .map(|i| start + (end - start) * i as f64 / 200.0)
        .map(|x| (x, posterior.pdf(x) * n as f64 * bin_width))
        .collect()
}

pub fn posterior_distribution_plot(
    results: &EffectSummary,
    posteriors: (&BetaPosterior, &BetaPosterior),
    path: &Path,
) -> Result<()> {
    let a_bins = histogram(&results.a_samples, N_BINS)?;
    let b_bins = histogram(&results.b_samples, N_BINS)?;
    let x_min = a_bins[0].start.min(b_bins[0].start);
    let x_max = a_bins[N_BINS - 1].end.max(b_bins[N_BINS - 1].end);
    let y_max = max_count(&a_bins).max(max_count(&b_bins)) * 1.1;
    let a_mean = stats::mean(&results.a_samples)?;
    let b_mean = stats::mean(&results.b_samples)?;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Posterior Distributions of Conversion Rates", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Conversion Rate")
        .y_desc("Frequency")
        .draw()?;

    let groups = [
        ("A", &a_bins, posteriors.0, a_mean, results.a_conversion, BLUE),
        ("B", &b_bins, posteriors.1, b_mean, results.b_conversion, RGBColor(255, 127, 14)),
    ];
    for (name, bins, posterior, mean, conversion, color) in groups {
        chart
            .draw_series(bins.iter().map(|bin| {
                Rectangle::new(
                    [(bin.start, 0.0), (bin.end, bin.count as f64)],
                    color.mix(0.5).filled(),
                )
            }))?
            .label(format!("Group {}: {:.2}%", name, conversion * 100.0))
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.mix(0.5).filled())
            });
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(mean, 0.0), (mean, y_max)],
            color.mix(0.7).stroke_width(2),
        )))?;
        chart.draw_series(LineSeries::new(
            density_curve(posterior, results.n_simulations, bins),
            color.stroke_width(2),
        ))?;
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

pub fn interval_width_comparison_plot(
    results: &EffectSummary,
    estimate: &SampleSizeEstimate,
    target_width: f64,
    path: &Path,
) -> Result<()> {
    let bars = [
        ("Current Width", results.ci_width, BLUE),
        ("Estimated Width After Additional Samples", estimate.estimated_final_width, GREEN),
        ("Target Width", target_width, RED),
    ];
    let y_max = bars.iter().map(|(_, w, _)| *w).fold(0.0, f64::max) * 1.2;

    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Credible Interval Width Comparison", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(20)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..bars.len() as f64, 0.0..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_desc("Width (%)")
        .draw()?;

    for (i, (label, width, color)) in bars.into_iter().enumerate() {
        let x0 = i as f64 + 0.15;
        let x1 = i as f64 + 0.85;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, 0.0), (x1, width)],
            color.mix(0.7).filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{:.2}%", width),
            (x0 + 0.25, width + y_max * 0.02),
            ("sans-serif", 16).into_font(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            label.to_string(),
            (x0, y_max * 0.97),
            ("sans-serif", 14).into_font(),
        )))?;
    }
    root.present()?;
    Ok(())
}

/// Render every plot into `out_dir` and return the written paths.
pub fn save_all_plots(
    results: &EffectSummary,
    posteriors: (&BetaPosterior, &BetaPosterior),
    estimate: &SampleSizeEstimate,
    target_width: f64,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let uplift_path = out_dir.join("uplift_distribution.svg");
    let posterior_path = out_dir.join("posterior_distributions.svg");
    let width_path = out_dir.join("interval_width_comparison.svg");

    debug!("Rendering {}", uplift_path.display());
    uplift_distribution_plot(results, &uplift_path)?;
    debug!("Rendering {}", posterior_path.display());
    posterior_distribution_plot(results, posteriors, &posterior_path)?;
    debug!("Rendering {}", width_path.display());
    interval_width_comparison_plot(results, estimate, target_width, &width_path)?;
    info!("Saved plots to {}", out_dir.display());
    Ok(vec![uplift_path, posterior_path, width_path])
}
