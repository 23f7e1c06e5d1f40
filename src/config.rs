//! Engine configuration.
//!
//! Loaded from a TOML file; every key is optional:
//!
//! ```toml
//! precision = 0.01
//! baseline_frequency = 0.00001
//! immune_groups = "data/dpb1_groups.tsv"
//! frequencies = "data/dpb1_frequencies.tsv.gz"
//! g_groups = "data/dpb1_g_groups.tsv"
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::MatchAggregator;
use crate::reference::DEFAULT_BASELINE_FREQUENCY;

/// Default rounding step of reported match probabilities
pub const DEFAULT_PRECISION: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Rounding step of reported probabilities, within (0, 1]
    pub precision: f64,
    /// Frequency assumed for alleles missing from the frequency table
    pub baseline_frequency: f64,
    /// Immune group table (`allele<delim>group`)
    pub immune_groups: Option<PathBuf>,
    /// Allele frequency table (`race<delim>allele<delim>frequency`)
    pub frequencies: Option<PathBuf>,
    /// G group table (`allele<delim>g_group`) applied before trimming
    pub g_groups: Option<PathBuf>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            baseline_frequency: DEFAULT_BASELINE_FREQUENCY,
            immune_groups: None,
            frequencies: None,
            g_groups: None,
        }
    }
}

impl MatchConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config.relative_to(path.parent().unwrap_or_else(|| Path::new("."))))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: MatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        MatchAggregator::new(self.precision)?;
        if !(0.0..=1.0).contains(&self.baseline_frequency) {
            return Err(anyhow!(
                "baseline_frequency must be within [0, 1], got {}",
                self.baseline_frequency
            ));
        }
        Ok(())
    }

    /// Resolve relative data paths against the config file's directory
    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.immune_groups = self.immune_groups.map(resolve);
        self.frequencies = self.frequencies.map(resolve);
        self.g_groups = self.g_groups.map(resolve);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MatchConfig::parse("").unwrap();
        assert_eq!(config, MatchConfig::default());
        assert_eq!(config.precision, 0.01);
        assert_eq!(config.baseline_frequency, 0.00001);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(MatchConfig::parse("precision = 0.0").is_err());
        assert!(MatchConfig::parse("precision = 2.0").is_err());
        assert!(MatchConfig::parse("precision = 1e-320").is_err());
        assert!(MatchConfig::parse("baseline_frequency = -0.1").is_err());
        assert!(MatchConfig::parse("cache_millis = 10").is_err());
    }

    #[test]
    fn test_load_resolves_relative_paths() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("dpb1.toml");
        let mut file = fs::File::create(&path)?;
        writeln!(file, "precision = 0.001")?;
        writeln!(file, "immune_groups = \"groups.tsv\"")?;
        writeln!(file, "frequencies = \"/data/freqs.tsv\"")?;

        let config = MatchConfig::load_from_path(&path)?;
        assert_eq!(config.precision, 0.001);
        assert_eq!(config.immune_groups, Some(temp_dir.path().join("groups.tsv")));
        assert_eq!(config.frequencies, Some(PathBuf::from("/data/freqs.tsv")));
        Ok(())
    }
}
