use crate::sample_size::SearchConfig;
use crate::simulation::SimulationConfig;
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Settings for one analysis run. Missing fields in a config file fall back to their
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub simulation: SimulationConfig,
    pub search: SearchConfig,
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            anyhow::anyhow!("Could not open config file: {} ({})", path.display(), e)
        })?;
        let config: AnalysisConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| anyhow::anyhow!("Error parsing config file {}: {}", path.display(), e))?;
        config.validate()?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.search.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(contents.as_bytes())
            .expect("Failed to write data");
        temp_file
    }

    #[test]
    fn test_full_config() {
        let file = config_file(
            r#"{
                "simulation": {"n_simulations": 20000, "prior": {"alpha": 2.0, "beta": 5.0}},
                "search": {
                    "low_factor": 0.5,
                    "high_factor": 1.5,
                    "undershoot_high_factor": 3.0,
                    "iterations": 8,
                    "search_simulations": 10000,
                    "rounding_step": 100
                }
            }"#,
        );
        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.simulation.n_simulations, 20000);
        assert_eq!(config.simulation.prior.alpha, 2.0);
        assert_eq!(config.simulation.prior.beta, 5.0);
        assert_eq!(config.search.iterations, 8);
        assert_eq!(config.search.rounding_step, 100);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = config_file(r#"{"search": {"iterations": 3}}"#);
        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.simulation, SimulationConfig::default());
        assert_eq!(config.search.iterations, 3);
        assert_eq!(config.search.search_simulations, 50_000);
    }

    #[test]
    fn test_invalid_config() {
        for contents in vec![
            r#"{"simulation": {"prior": {"alpha": 0.0, "beta": 1.0}}}"#,
            r#"{"simulation": {"n_simulations": 0}}"#,
            r#"{"search": {"low_factor": 2.0}}"#,
            "not json",
        ] {
            let file = config_file(contents);
            assert!(AnalysisConfig::from_json_file(file.path()).is_err());
        }
    }

    #[test]
    fn test_missing_config_file() {
        let result = AnalysisConfig::from_json_file(Path::new("/nonexistent/bayes_ab.json"));
        assert!(result.is_err());
    }
}
