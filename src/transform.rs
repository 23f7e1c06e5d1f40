//! GL string coarsening applied before matching.
//!
//! High-resolution typings (`HLA-DPB1*04:01:01:02`) are reduced to the two
//! field names the reference tables are keyed by. Alleles sharing a G group
//! are first replaced by the group name, so every member trims to the same
//! allele.

use tracing::trace;

use crate::error::EngineResult;
use crate::parsers::glstring::parse_allele;
use crate::reference::{GGroupTable, GlStringTransformer};

/// Maps alleles to their G group (when known) and trims them to two fields.
/// Alleles that coarsen to the same name within one allele list are listed once.
#[derive(Debug, Clone, Default)]
pub struct AlleleTrimmer {
    g_groups: GGroupTable,
}

impl AlleleTrimmer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_g_groups(g_groups: GGroupTable) -> Self {
        Self { g_groups }
    }

    fn transform_allele_list(&self, list: &str) -> String {
        let mut names: Vec<String> = Vec::new();
        for name in list.split('/') {
            let name = self.transform_allele(name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.join("/")
    }

    /// Names that are not valid alleles pass through untouched for the
    /// resolver to reject.
    fn transform_allele(&self, name: &str) -> String {
        match parse_allele(name) {
            Ok(allele) => {
                let name = self
                    .g_groups
                    .g_group(allele.glstring())
                    .unwrap_or(allele.glstring());
                trim_fields(name, 2)
            }
            Err(_) => name.to_string(),
        }
    }
}

impl GlStringTransformer for AlleleTrimmer {
    fn transform(&self, glstring: &str) -> EngineResult<String> {
        let transformed = glstring
            .split('|')
            .map(|genotype| {
                genotype
                    .split('+')
                    .map(|haplotype| {
                        haplotype
                            .split('~')
                            .map(|list| self.transform_allele_list(list))
                            .collect::<Vec<_>>()
                            .join("~")
                    })
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect::<Vec<_>>()
            .join("|");

        if transformed != glstring {
            trace!("transformed {} -> {}", glstring, transformed);
        }
        Ok(transformed)
    }
}

/// Keep the first `fields` colon-separated fields of an allele name
pub fn trim_fields(name: &str, fields: usize) -> String {
    match name.split_once('*') {
        Some((locus, rest)) => {
            let kept: Vec<&str> = rest.split(':').take(fields).collect();
            format!("{}*{}", locus, kept.join(":"))
        }
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_fields() {
        assert_eq!(trim_fields("HLA-DPB1*04:01:01:02", 2), "HLA-DPB1*04:01");
        assert_eq!(trim_fields("HLA-DPB1*04:01", 2), "HLA-DPB1*04:01");
        assert_eq!(trim_fields("HLA-DPB1*01:01:01G", 2), "HLA-DPB1*01:01");
        assert_eq!(trim_fields("HLA-DPB1*04:01:01", 3), "HLA-DPB1*04:01:01");
    }

    #[test]
    fn test_trims_and_coalesces() -> EngineResult<()> {
        let trimmer = AlleleTrimmer::new();
        assert_eq!(
            trimmer.transform(
                "HLA-DPB1*04:01:01:01/HLA-DPB1*04:01:01:02/DPB1*02:01:02+HLA-DPB1*03:01:01"
            )?,
            "HLA-DPB1*04:01/HLA-DPB1*02:01+HLA-DPB1*03:01"
        );
        assert_eq!(
            trimmer.transform("HLA-DRB1*15:01:01~HLA-DPB1*04:01:01|HLA-DPB1*04:01")?,
            "HLA-DRB1*15:01~HLA-DPB1*04:01|HLA-DPB1*04:01"
        );
        Ok(())
    }

    #[test]
    fn test_g_group_members_share_a_name() -> EngineResult<()> {
        let mut g_groups = GGroupTable::new();
        g_groups.insert("HLA-DPB1*04:01:01:01", "HLA-DPB1*04:01:01G");
        g_groups.insert("HLA-DPB1*126:01:01", "HLA-DPB1*04:01:01G");
        let trimmer = AlleleTrimmer::with_g_groups(g_groups);

        assert_eq!(
            trimmer.transform("HLA-DPB1*126:01:01/HLA-DPB1*04:01:01:01+HLA-DPB1*126:01:02")?,
            "HLA-DPB1*04:01+HLA-DPB1*126:01"
        );
        Ok(())
    }

    #[test]
    fn test_invalid_names_pass_through() -> EngineResult<()> {
        let trimmer = AlleleTrimmer::new();
        assert_eq!(trimmer.transform("garbage+")?, "garbage+");
        assert_eq!(
            trimmer.transform("HLA-DPB1*04:01^HLA-DQB1*02:01")?,
            "HLA-DPB1*04:01^HLA-DQB1*02:01"
        );
        Ok(())
    }
}
