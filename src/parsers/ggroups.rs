use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::parsers::glstring::parse_allele;
use crate::parsers::{delimited_reader, read_file};
use crate::reference::GGroupTable;

#[derive(Debug, Deserialize)]
struct GGroupRecord {
    allele: String,
    g_group: String,
}

/// Parser for `allele<delim>g_group` tables (header row required), e.g.
/// `DPB1*04:01:01:01,DPB1*04:01:01G`
pub struct GGroupParser;

impl GGroupParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<GGroupTable> {
        let content = read_file(path)?;
        self.parse_str(&content)
            .with_context(|| format!("Failed to parse G groups: {}", path.display()))
    }

    pub fn parse_str(&self, content: &str) -> Result<GGroupTable> {
        let mut table = GGroupTable::new();
        let mut reader = delimited_reader(content);

        for (i, record) in reader.deserialize::<GGroupRecord>().enumerate() {
            let record = record.with_context(|| format!("Invalid record {}", i + 1))?;
            let allele = parse_allele(&record.allele)?;
            let g_group = parse_allele(&record.g_group)
                .with_context(|| format!("Invalid G group for {}", allele))?;
            table.insert(allele.glstring(), g_group.glstring());
        }

        tracing::info!("Loaded G groups for {} alleles", table.len());
        Ok(table)
    }
}

impl Default for GGroupParser {
    fn default() -> Self {
        Self::new()
    }
}
