use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::analysis::MatchRequest;
use crate::parsers::{delimited_reader, read_file};
use crate::types::DetailRace;

#[derive(Debug, Deserialize)]
struct RequestRecord {
    id: String,
    recipient: String,
    #[serde(default)]
    recipient_race: String,
    donor: String,
    #[serde(default)]
    donor_race: String,
}

/// Parser for batch request files with columns
/// `id, recipient, recipient_race, donor, donor_race` (races may be empty)
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<Vec<MatchRequest>> {
        let content = read_file(path)?;
        self.parse_str(&content)
            .with_context(|| format!("Failed to parse match requests: {}", path.display()))
    }

    pub fn parse_str(&self, content: &str) -> Result<Vec<MatchRequest>> {
        let mut reader = delimited_reader(content);
        let mut requests = Vec::new();

        for (i, record) in reader.deserialize::<RequestRecord>().enumerate() {
            let record = record.with_context(|| format!("Invalid request {}", i + 1))?;
            requests.push(MatchRequest {
                recipient_race: parse_race(&record.recipient_race)
                    .with_context(|| format!("Invalid recipient race in {}", record.id))?,
                donor_race: parse_race(&record.donor_race)
                    .with_context(|| format!("Invalid donor race in {}", record.id))?,
                id: record.id,
                recipient: record.recipient,
                donor: record.donor,
            });
        }

        Ok(requests)
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_race(value: &str) -> Result<Option<DetailRace>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.parse()?))
    }
}
