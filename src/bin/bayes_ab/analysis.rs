use crate::{cli, output, plots};
use anyhow::Result;
use bayes_ab_utils::config::AnalysisConfig;
use bayes_ab_utils::observation::GroupObservation;
use bayes_ab_utils::report::{AnalysisReport, ReportWriter};
use bayes_ab_utils::{sample_size, simulation};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Instant;

/// Config file values overridden by any flag given on the command line.
pub fn resolve_config(args: &cli::Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config file: {}", path);
            AnalysisConfig::from_json_file(Path::new(path))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(n_simulations) = args.simulations {
        config.simulation.n_simulations = n_simulations;
    }
    if let Some(alpha) = args.alpha_prior {
        config.simulation.prior.alpha = alpha;
    }
    if let Some(beta) = args.beta_prior {
        config.simulation.prior.beta = beta;
    }
    config.validate()?;
    Ok(config)
}

pub fn bayes_ab(args: &cli::Cli) -> Result<()> {
    let global_timer = Instant::now();
    let text = !args.json;

    let a = GroupObservation::new(args.a_successes, args.a_total)
        .map_err(|e| anyhow::anyhow!("Invalid group A: {}", e))?;
    let b = GroupObservation::new(args.b_successes, args.b_total)
        .map_err(|e| anyhow::anyhow!("Invalid group B: {}", e))?;
    let config = resolve_config(args)?;
    let target_width = args.target_width;
    if !(target_width.is_finite() && target_width > 0.0) {
        anyhow::bail!("Target width must be positive, got {}", target_width);
    }
    debug!("Resolved config: {:?}", config);

    let mut rng = match args.seed {
        Some(seed) => {
            info!("Using seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let out_path = Path::new(&args.out);
    std::fs::create_dir_all(out_path).map_err(|e| {
        anyhow::anyhow!("Could not create output directory: {} ({})", args.out, e)
    })?;

    let prior = config.simulation.prior;
    if text {
        println!("{}", output::section_header("INPUT DATA"));
        output::print_lines(&output::input_data(
            &a,
            &b,
            target_width,
            config.simulation.n_simulations,
            &prior,
        ));
    }

    let timer = Instant::now();
    let results = simulation::evaluate(&a, &b, &config.simulation, &mut rng)?;
    info!("Simulation finished in {:?}", timer.elapsed());
    if text {
        println!("{}", output::section_header("BAYESIAN A/B TEST RESULTS"));
        output::print_lines(&output::simulation_results(&results));
        println!("{}", output::posterior_summary("A", &a, &prior));
        println!("{}", output::posterior_summary("B", &b, &prior));
    }

    let timer = Instant::now();
    let estimate = sample_size::estimate_additional_samples(
        &a,
        &b,
        target_width,
        &config.simulation,
        &config.search,
        &mut rng,
    )?;
    info!("Sample size search finished in {:?}", timer.elapsed());
    if text {
        println!("{}", output::section_header("SAMPLE SIZE ESTIMATION"));
        output::print_lines(&output::sample_size_results(&estimate, target_width));
    }

    let verification = if estimate.needs_more_samples() {
        let verification =
            sample_size::verify_estimate(&a, &b, &estimate, &config.simulation, &mut rng)?;
        if text {
            println!(
                "{}",
                output::section_header("VERIFICATION WITH INCREASED SAMPLE SIZE")
            );
            output::print_lines(&output::verification_results(&verification));
        }
        Some(verification)
    } else {
        None
    };

    if !args.no_plots {
        if text {
            println!("{}", output::section_header("VISUALIZATION"));
            println!("Generating plots...");
        }
        let posteriors = (prior.posterior(&a), prior.posterior(&b));
        match plots::save_all_plots(
            &results,
            (&posteriors.0, &posteriors.1),
            &estimate,
            target_width,
            out_path,
        ) {
            Ok(paths) => {
                if text {
                    println!("Plots saved to: {}", out_path.display());
                    for path in paths {
                        if let Some(name) = path.file_name() {
                            println!("- {}", name.to_string_lossy());
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Plot generation failed: {}", e);
                if text {
                    println!("Error generating plots: {}", e);
                }
            }
        }
    }

    let mut report_writer = ReportWriter::new(&out_path.join("summary.tsv"))?;
    report_writer.write_header()?;
    report_writer.write_summary("current", &a, &b, &results)?;
    if let Some(verification) = &verification {
        report_writer.write_summary(
            "verification",
            &a.augmented(estimate.additional_a)?,
            &b.augmented(estimate.additional_b)?,
            verification,
        )?;
    }
    report_writer.finish()?;

    let report = AnalysisReport {
        a,
        b,
        target_width,
        config,
        current: &results,
        estimate: &estimate,
        verification: verification.as_ref(),
    };
    report.write_json(&out_path.join("analysis.json"))?;
    info!("Wrote reports to {}", out_path.display());

    if text {
        println!("{}", output::separator());
    } else {
        println!("{}", report.to_json()?);
    }
    info!("Finished analysis in {:?}", global_timer.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_resolve_config_defaults() {
        let args = cli::Cli::parse_from(["bayes_ab"]);
        assert_eq!(resolve_config(&args).unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"simulation": {"n_simulations": 1000, "prior": {"alpha": 2.0, "beta": 2.0}}}"#,
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let args = cli::Cli::parse_from([
            "bayes_ab",
            "--config",
            path.as_str(),
            "--beta-prior",
            "4.0",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.simulation.n_simulations, 1000);
        assert_eq!(config.simulation.prior.alpha, 2.0);
        assert_eq!(config.simulation.prior.beta, 4.0);
    }

    #[test]
    fn test_invalid_prior_flag() {
        let args = cli::Cli::parse_from(["bayes_ab", "--alpha-prior", "0"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_run_writes_reports() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("run");
        let out_str = out.to_str().unwrap().to_string();
        let args = cli::Cli::parse_from([
            "bayes_ab",
            "--simulations",
            "5000",
            "--seed",
            "1",
            "--target-width",
            "20",
            "--out",
            out_str.as_str(),
        ]);
        bayes_ab(&args).unwrap();

        assert!(out.join("summary.tsv").exists());
        assert!(out.join("analysis.json").exists());
        assert!(out.join("uplift_distribution.svg").exists());
        assert!(out.join("posterior_distributions.svg").exists());
        assert!(out.join("interval_width_comparison.svg").exists());
        let summary = std::fs::read_to_string(out.join("summary.tsv")).unwrap();
        assert!(summary.lines().nth(1).unwrap().starts_with("current\t54\t92\t66\t93"));
    }

    #[test]
    fn test_run_rejects_invalid_counts() {
        let dir = tempdir().unwrap();
        let out_str = dir.path().to_str().unwrap().to_string();
        let args = cli::Cli::parse_from([
            "bayes_ab",
            "--a-successes",
            "100",
            "--a-total",
            "92",
            "--out",
            out_str.as_str(),
        ]);
        assert!(bayes_ab(&args).is_err());
    }
}
