use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::parsers::glstring::parse_allele;
use crate::parsers::{delimited_reader, read_file};
use crate::reference::FrequencyTable;
use crate::types::DetailRace;

#[derive(Debug, Deserialize)]
struct FrequencyRecord {
    race: String,
    allele: String,
    frequency: f64,
}

/// Parser for `race<delim>allele<delim>frequency` tables (header row required)
pub struct FrequencyParser {
    baseline: f64,
}

impl FrequencyParser {
    /// `baseline` is returned by the loaded table for unlisted alleles
    pub fn new(baseline: f64) -> Self {
        Self { baseline }
    }

    pub fn parse(&self, path: &Path) -> Result<FrequencyTable> {
        let content = read_file(path)?;
        self.parse_str(&content)
            .with_context(|| format!("Failed to parse allele frequencies: {}", path.display()))
    }

    pub fn parse_str(&self, content: &str) -> Result<FrequencyTable> {
        let mut table = FrequencyTable::new(self.baseline);
        let mut reader = delimited_reader(content);

        for (i, record) in reader.deserialize::<FrequencyRecord>().enumerate() {
            let record = record.with_context(|| format!("Invalid record {}", i + 1))?;
            let race: DetailRace = record.race.parse()?;
            let allele = parse_allele(&record.allele)
                .with_context(|| format!("Invalid allele in record {}", i + 1))?;
            if !(0.0..=1.0).contains(&record.frequency) {
                return Err(anyhow!(
                    "Frequency {} for {} ({}) is outside [0, 1]",
                    record.frequency,
                    allele,
                    race
                ));
            }
            table.insert(race, allele.glstring(), record.frequency);
        }

        tracing::info!("Loaded {} allele frequencies", table.len());
        Ok(table)
    }
}
