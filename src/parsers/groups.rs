use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::parsers::glstring::parse_allele;
use crate::parsers::{delimited_reader, read_file};
use crate::reference::ImmuneGroupTable;
use crate::types::ImmuneGroup;

#[derive(Debug, Deserialize)]
struct GroupRecord {
    allele: String,
    group: String,
}

/// Parser for `allele<delim>group` immune group tables (header row required).
///
/// Group values: a non-negative integer is a numbered group, `-` or
/// `unassigned` marks an allele outside every elevated group, and `unknown`
/// or an empty value lists the allele without a resolvable group.
pub struct ImmuneGroupParser;

impl ImmuneGroupParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<ImmuneGroupTable> {
        let content = read_file(path)?;
        self.parse_str(&content)
            .with_context(|| format!("Failed to parse immune groups: {}", path.display()))
    }

    pub fn parse_str(&self, content: &str) -> Result<ImmuneGroupTable> {
        let mut table = ImmuneGroupTable::new();
        let mut reader = delimited_reader(content);

        for (i, record) in reader.deserialize::<GroupRecord>().enumerate() {
            let record = record.with_context(|| format!("Invalid record {}", i + 1))?;
            let allele = parse_allele(&record.allele)?;
            let group = parse_group(&record.group)
                .with_context(|| format!("Invalid group for {}", allele))?;
            table.insert(allele.glstring(), group);
        }

        tracing::info!("Loaded immune groups for {} alleles", table.len());
        Ok(table)
    }
}

impl Default for ImmuneGroupParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_group(value: &str) -> Result<Option<ImmuneGroup>> {
    match value.trim().to_lowercase().as_str() {
        "" | "unknown" => Ok(None),
        "-" | "unassigned" => Ok(Some(ImmuneGroup::Unassigned)),
        other => other
            .parse::<u32>()
            .map(|n| Some(ImmuneGroup::Group(n)))
            .map_err(|_| anyhow!("Unrecognized immune group '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ImmuneGroupResolver;
    use crate::types::Allele;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_group_values() -> Result<()> {
        assert_eq!(parse_group("3")?, Some(ImmuneGroup::Group(3)));
        assert_eq!(parse_group("0")?, Some(ImmuneGroup::Group(0)));
        assert_eq!(parse_group("-")?, Some(ImmuneGroup::Unassigned));
        assert_eq!(parse_group("Unassigned")?, Some(ImmuneGroup::Unassigned));
        assert_eq!(parse_group("")?, None);
        assert_eq!(parse_group("unknown")?, None);
        assert!(parse_group("high").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_group_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("groups.tsv");
        let mut file = File::create(&path)?;
        writeln!(file, "# TCE3 groups")?;
        writeln!(file, "allele\tgroup")?;
        writeln!(file, "HLA-DPB1*09:01\t1")?;
        writeln!(file, "HLA-DPB1*04:01\t3")?;
        writeln!(file, "HLA-DPB1*02:01\t-")?;
        writeln!(file, "HLA-DPB1*85:01\tunknown")?;

        let table = ImmuneGroupParser::new().parse(&path)?;
        assert_eq!(table.len(), 4);
        let lookup = |name: &str| table.immune_group(&Allele::new(name).unwrap());
        assert_eq!(lookup("HLA-DPB1*09:01"), Some(ImmuneGroup::Group(1)));
        assert_eq!(lookup("HLA-DPB1*02:01"), Some(ImmuneGroup::Unassigned));
        assert_eq!(lookup("HLA-DPB1*85:01"), None);
        Ok(())
    }

    #[test]
    fn test_shorthand_alleles_are_normalized() -> Result<()> {
        let table = ImmuneGroupParser::new().parse_str("allele,group\nDPB1*04:01,3\n")?;
        let allele = Allele::new("HLA-DPB1*04:01")?;
        assert_eq!(table.immune_group(&allele), Some(ImmuneGroup::Group(3)));
        assert_eq!(table.alleles().next(), Some(("HLA-DPB1*04:01", Some(ImmuneGroup::Group(3)))));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_rows() {
        let parser = ImmuneGroupParser::new();
        assert!(parser.parse_str("allele,group\nDPB1-04:01,3\n").is_err());
        assert!(parser.parse_str("allele,group\nHLA-DPB1*04:01,high\n").is_err());
    }
}
