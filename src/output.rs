use anyhow::{Context, Result};
use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::MatchOutcome;
use crate::types::MatchGrade;

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Tsv,
    All,
}

/// One flattened report line per match request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub grade: Option<MatchGrade>,
    pub match_probability: Option<f64>,
    pub permissive_probability: Option<f64>,
    pub hvg_probability: Option<f64>,
    pub gvh_probability: Option<f64>,
    pub unknown_probability: Option<f64>,
    pub error: Option<String>,
}

impl From<&MatchOutcome> for ReportRow {
    fn from(outcome: &MatchOutcome) -> Self {
        match &outcome.result {
            Ok(result) => ReportRow {
                id: outcome.id.clone(),
                grade: Some(result.grade),
                match_probability: Some(result.match_probability),
                permissive_probability: Some(result.permissive_probability),
                hvg_probability: Some(result.hvg_probability),
                gvh_probability: Some(result.gvh_probability),
                unknown_probability: Some(result.unknown_probability),
                error: None,
            },
            Err(e) => ReportRow {
                id: outcome.id.clone(),
                grade: None,
                match_probability: None,
                permissive_probability: None,
                hvg_probability: None,
                gvh_probability: None,
                unknown_probability: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Writes batch match results to timestamped report files
pub struct ReportGenerator {
    output_dir: PathBuf,
    timestamp: String,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Result<Self> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory: {}", output_dir.display())
            })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            timestamp: Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
        })
    }

    /// Generate reports in the specified format(s), returning the files written
    pub fn generate(&self, outcomes: &[MatchOutcome], format: ReportFormat) -> Result<Vec<PathBuf>> {
        let rows: Vec<ReportRow> = outcomes.iter().map(ReportRow::from).collect();

        let written = match format {
            ReportFormat::Json => vec![self.generate_json_report(&rows)?],
            ReportFormat::Csv => vec![self.generate_delimited_report(&rows, b',', "csv")?],
            ReportFormat::Tsv => vec![self.generate_delimited_report(&rows, b'\t', "tsv")?],
            ReportFormat::All => vec![
                self.generate_json_report(&rows)?,
                self.generate_delimited_report(&rows, b',', "csv")?,
                self.generate_delimited_report(&rows, b'\t', "tsv")?,
            ],
        };

        Ok(written)
    }

    fn report_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("match_report_{}.{}", self.timestamp, extension))
    }

    fn generate_json_report(&self, rows: &[ReportRow]) -> Result<PathBuf> {
        let path = self.report_path("json");
        let json = to_string_pretty(rows)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
        Ok(path)
    }

    fn generate_delimited_report(
        &self,
        rows: &[ReportRow],
        delimiter: u8,
        extension: &str,
    ) -> Result<PathBuf> {
        let path = self.report_path(extension);
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)
            .with_context(|| format!("Failed to create report: {}", path.display()))?;

        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(path)
    }
}
