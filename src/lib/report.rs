use crate::config::AnalysisConfig;
use crate::observation::GroupObservation;
use crate::sample_size::SampleSizeEstimate;
use crate::stats::EffectSummary;
use anyhow::Result;
use csv::{Writer, WriterBuilder};
use log::debug;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Columns of the tab-separated summary report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ReportField {
    Label,
    ASuccesses,
    ATotal,
    BSuccesses,
    BTotal,
    NSimulations,
    AbsMean,
    AbsCiLower,
    AbsCiUpper,
    MeanUplift,
    CiLower,
    CiUpper,
    CiWidth,
    ProbBBetter,
    ExpectedLoss,
    NDegenerateDraws,
}

impl ReportField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportField::Label => "label",
            ReportField::ASuccesses => "a_successes",
            ReportField::ATotal => "a_total",
            ReportField::BSuccesses => "b_successes",
            ReportField::BTotal => "b_total",
            ReportField::NSimulations => "n_simulations",
            ReportField::AbsMean => "abs_mean",
            ReportField::AbsCiLower => "abs_ci_lower",
            ReportField::AbsCiUpper => "abs_ci_upper",
            ReportField::MeanUplift => "mean_uplift",
            ReportField::CiLower => "ci_lower",
            ReportField::CiUpper => "ci_upper",
            ReportField::CiWidth => "ci_width",
            ReportField::ProbBBetter => "prob_b_better",
            ReportField::ExpectedLoss => "expected_loss",
            ReportField::NDegenerateDraws => "n_degenerate_draws",
        }
    }

    pub fn all_as_string() -> Vec<String> {
        ReportField::iter().map(|f| f.as_str().to_string()).collect()
    }

    fn value(
        &self,
        label: &str,
        a: &GroupObservation,
        b: &GroupObservation,
        summary: &EffectSummary,
    ) -> String {
        match self {
            ReportField::Label => label.to_string(),
            ReportField::ASuccesses => a.successes.to_string(),
            ReportField::ATotal => a.total.to_string(),
            ReportField::BSuccesses => b.successes.to_string(),
            ReportField::BTotal => b.total.to_string(),
            ReportField::NSimulations => summary.n_simulations.to_string(),
            ReportField::AbsMean => format!("{:.6}", summary.abs_mean),
            ReportField::AbsCiLower => format!("{:.6}", summary.abs_ci_lower),
            ReportField::AbsCiUpper => format!("{:.6}", summary.abs_ci_upper),
            ReportField::MeanUplift => format!("{:.6}", summary.mean_uplift),
            ReportField::CiLower => format!("{:.6}", summary.ci_lower),
            ReportField::CiUpper => format!("{:.6}", summary.ci_upper),
            ReportField::CiWidth => format!("{:.6}", summary.ci_width),
            ReportField::ProbBBetter => format!("{:.6}", summary.prob_b_better),
            ReportField::ExpectedLoss => format!("{:.6}", summary.expected_loss),
            ReportField::NDegenerateDraws => summary.n_degenerate_draws.to_string(),
        }
    }
}

pub struct ReportWriter {
    writer: Writer<File>,
}

impl ReportWriter {
    pub fn new(file_path: &Path) -> Result<Self> {
        let file = File::create(file_path).map_err(|e| {
            anyhow::anyhow!("Could not create report file: {} ({})", file_path.display(), e)
        })?;
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_writer(file);
        Ok(Self { writer })
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(ReportField::all_as_string())?;
        Ok(())
    }

    pub fn write_summary(
        &mut self,
        label: &str,
        a: &GroupObservation,
        b: &GroupObservation,
        summary: &EffectSummary,
    ) -> Result<()> {
        debug!("Writing {} summary to report", label);
        let record: Vec<String> = ReportField::iter()
            .map(|field| field.value(label, a, b, summary))
            .collect();
        self.writer.write_record(&record)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Everything produced by one analysis run.
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub a: GroupObservation,
    pub b: GroupObservation,
    pub target_width: f64,
    pub config: AnalysisConfig,
    pub current: &'a EffectSummary,
    pub estimate: &'a SampleSizeEstimate,
    pub verification: Option<&'a EffectSummary>,
}

impl AnalysisReport<'_> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, file_path: &Path) -> Result<()> {
        let file = File::create(file_path).map_err(|e| {
            anyhow::anyhow!("Could not create report file: {} ({})", file_path.display(), e)
        })?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;
    use std::fs;
    use tempfile::tempdir;

    fn dummy_summary() -> EffectSummary {
        let mut summary =
            stats::summarize(vec![0.5, 0.4, 0.5, 0.2], vec![0.6, 0.3, 0.5, 0.4]).unwrap();
        summary.a_conversion = 0.5;
        summary.b_conversion = 0.6;
        summary
    }

    fn dummy_estimate() -> SampleSizeEstimate {
        SampleSizeEstimate {
            additional_a: 3800,
            additional_b: 3860,
            total_a: 3892,
            total_b: 3953,
            estimated_final_width: 7.9,
        }
    }

    #[test]
    fn test_header_fields() {
        let header = ReportField::all_as_string();
        assert_eq!(header.len(), 16);
        assert_eq!(header[0], "label");
        assert_eq!(header[12], "ci_width");
        assert_eq!(header[15], "n_degenerate_draws");
    }

    #[test]
    fn test_write_summary_tsv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        let a = GroupObservation::new(54, 92).unwrap();
        let b = GroupObservation::new(66, 93).unwrap();
        let summary = dummy_summary();

        let mut writer = ReportWriter::new(&path).unwrap();
        writer.write_header().unwrap();
        writer.write_summary("current", &a, &b, &summary).unwrap();
        writer.write_summary("verification", &a, &b, &summary).unwrap();
        writer.finish().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("label\ta_successes\ta_total"));
        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[0], "current");
        assert_eq!(fields[1], "54");
        assert_eq!(fields[4], "93");
        assert_eq!(fields[5], "4");
        assert_eq!(fields[6], "5.000000");
        assert!(lines[2].starts_with("verification\t"));
    }

    #[test]
    fn test_analysis_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        let summary = dummy_summary();
        let estimate = dummy_estimate();
        let report = AnalysisReport {
            a: GroupObservation::new(54, 92).unwrap(),
            b: GroupObservation::new(66, 93).unwrap(),
            target_width: 8.0,
            config: AnalysisConfig::default(),
            current: &summary,
            estimate: &estimate,
            verification: None,
        };
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["a"]["successes"], 54);
        assert_eq!(value["estimate"]["additional_a"], 3800);
        assert_eq!(value["config"]["search"]["iterations"], 5);
        assert_eq!(value["current"]["n_simulations"], 4);
        assert!(value["current"].get("a_samples").is_none());
        assert!(value["verification"].is_null());
        assert_eq!(report.to_json().unwrap(), serde_json::to_string_pretty(&report).unwrap());
    }
}
