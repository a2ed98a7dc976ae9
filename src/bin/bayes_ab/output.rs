use bayes_ab_utils::model::Prior;
use bayes_ab_utils::observation::GroupObservation;
use bayes_ab_utils::sample_size::SampleSizeEstimate;
use bayes_ab_utils::stats::EffectSummary;

const LINE_WIDTH: usize = 60;

pub fn separator() -> String {
    "=".repeat(LINE_WIDTH)
}

pub fn section_header(title: &str) -> String {
    let padded = format!(" {} ", title);
    format!(
        "{}\n{:=^width$}\n{}",
        separator(),
        padded,
        separator(),
        width = LINE_WIDTH
    )
}

/// Integer with thousands separators
fn grouped(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn input_data(
    a: &GroupObservation,
    b: &GroupObservation,
    target_width: f64,
    n_simulations: usize,
    prior: &Prior,
) -> Vec<String> {
    vec![
        format!("Group A: {}", a),
        format!("Group B: {}", b),
        format!("Target CI Width: {}%", target_width),
        format!("Number of Simulations: {}", grouped(n_simulations)),
        format!("Prior: Beta({}, {})", prior.alpha, prior.beta),
    ]
}

/// Exact per-group posterior summaries, computed analytically.
pub fn posterior_summary(name: &str, observation: &GroupObservation, prior: &Prior) -> String {
    let posterior = prior.posterior(observation);
    match posterior.credible_interval(0.95) {
        Ok((lower, upper)) => format!(
            "Posterior {}: mean {:.2}%, sd {:.2}%, 95% CI [{:.2}%, {:.2}%]",
            name,
            posterior.mean() * 100.0,
            posterior.standard_deviation() * 100.0,
            lower * 100.0,
            upper * 100.0
        ),
        Err(e) => format!("Posterior {}: unavailable ({})", name, e),
    }
}

pub fn simulation_results(results: &EffectSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Conversion A: {:.2}%", results.a_conversion * 100.0),
        format!("Conversion B: {:.2}%", results.b_conversion * 100.0),
        format!("Absolute Difference: {:.2}%", results.abs_mean),
        format!(
            "Absolute 95% CI: [{:.2}%, {:.2}%]",
            results.abs_ci_lower, results.abs_ci_upper
        ),
        format!("Relative Uplift: {:.2}%", results.mean_uplift),
        format!(
            "Relative 95% CI: [{:.2}%, {:.2}%]",
            results.ci_lower, results.ci_upper
        ),
        format!("Interval Width: {:.2}%", results.ci_width),
        format!("Probability B > A: {:.2}%", results.prob_b_better * 100.0),
        format!("Expected Loss: {:.4}", results.expected_loss),
    ];
    if results.n_degenerate_draws > 0 {
        lines.push(format!(
            "Excluded Draws (undefined uplift): {}",
            results.n_degenerate_draws
        ));
    }
    lines
}

pub fn sample_size_results(estimate: &SampleSizeEstimate, target_width: f64) -> Vec<String> {
    let mut lines = vec![
        format!("Target CI Width: {:.1}%", target_width),
        format!(
            "Additional Samples Needed for Group A: {}",
            estimate.additional_a
        ),
        format!(
            "Additional Samples Needed for Group B: {}",
            estimate.additional_b
        ),
        format!("Total Final Sample Size A: {}", estimate.total_a),
        format!("Total Final Sample Size B: {}", estimate.total_b),
        format!(
            "Estimated Final CI Width: {:.2}%",
            estimate.estimated_final_width
        ),
    ];
    if !estimate.target_met(target_width) {
        lines.push(
            "Note: the search did not reach the target width, the estimate is a best effort"
                .to_string(),
        );
    }
    lines
}

pub fn verification_results(verification: &EffectSummary) -> Vec<String> {
    vec![
        format!("Verified CI Width: {:.2}%", verification.ci_width),
        format!(
            "Verified 95% CI: [{:.2}%, {:.2}%]",
            verification.ci_lower, verification.ci_upper
        ),
        format!(
            "Verified Probability B > A: {:.2}%",
            verification.prob_b_better * 100.0
        ),
    ]
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
