// src/cli.rs
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "bayes_ab",
    version,
    about = "Bayesian A/B test analyzer and sample size estimator"
)]
pub struct Cli {
    #[arg(long, default_value = "54", help = "Number of successes in group A")]
    pub a_successes: u64,

    #[arg(long, default_value = "92", help = "Total trials in group A")]
    pub a_total: u64,

    #[arg(long, default_value = "66", help = "Number of successes in group B")]
    pub b_successes: u64,

    #[arg(long, default_value = "93", help = "Total trials in group B")]
    pub b_total: u64,

    #[arg(
        long,
        default_value = "8.0",
        help = "Target width of the 95% credible interval of the uplift, in percentage points"
    )]
    pub target_width: f64,

    #[arg(
        long,
        value_name = "N",
        help = "Number of Monte Carlo simulations [default: 100000, or the config file value]"
    )]
    pub simulations: Option<usize>,

    #[arg(long, help = "Alpha parameter of the Beta prior [default: 1.0]")]
    pub alpha_prior: Option<f64>,

    #[arg(long, help = "Beta parameter of the Beta prior [default: 1.0]")]
    pub beta_prior: Option<f64>,

    #[arg(long, help = "Seed for the random number generator, for reproducible runs")]
    pub seed: Option<u64>,

    #[arg(
        long,
        short,
        value_name = "CONFIG",
        help = "JSON file with simulation and search settings"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        short,
        default_value = "bayes_ab",
        value_name = "OUT",
        help = "Output directory for plots and reports"
    )]
    pub out: String,

    #[arg(long, help = "Disable plot generation")]
    pub no_plots: bool,

    #[arg(long, help = "Print results as JSON instead of formatted text")]
    pub json: bool,

    #[arg(
        value_enum,
        long,
        default_value = "normal",
        value_name = "VERBOSITY",
        help = "Verbosity level"
    )]
    pub verbosity: LogLevel,
}

#[allow(non_camel_case_types)]
#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    verbose,
    normal,
    silent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["bayes_ab"]);
        assert_eq!(cli.a_successes, 54);
        assert_eq!(cli.a_total, 92);
        assert_eq!(cli.b_successes, 66);
        assert_eq!(cli.b_total, 93);
        assert_eq!(cli.target_width, 8.0);
        assert!(cli.simulations.is_none());
        assert!(cli.seed.is_none());
        assert!(!cli.no_plots);
        assert_eq!(cli.out, "bayes_ab");
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "bayes_ab",
            "--a-successes",
            "5000",
            "--a-total",
            "10000",
            "--simulations",
            "2000",
            "--alpha-prior",
            "2.5",
            "--seed",
            "7",
            "--no-plots",
            "--verbosity",
            "silent",
        ]);
        assert_eq!(cli.a_successes, 5000);
        assert_eq!(cli.a_total, 10000);
        assert_eq!(cli.simulations, Some(2000));
        assert_eq!(cli.alpha_prior, Some(2.5));
        assert_eq!(cli.seed, Some(7));
        assert!(cli.no_plots);
        assert!(matches!(cli.verbosity, LogLevel::silent));
    }
}
