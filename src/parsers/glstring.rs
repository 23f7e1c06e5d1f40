use crate::error::{EngineResult, MatchError};
use crate::reference::GenotypeListResolver;
use crate::types::{Allele, AlleleList, Genotype, GenotypeList, Haplotype};

/// Local GL string parser.
///
/// Operators from loosest to tightest binding: `|` genotype list,
/// `+` genotype, `~` haplotype, `/` allele list. Multi-locus unphased
/// genotypes (`^`) are rejected. Allele names without the `HLA-` prefix
/// (e.g. `DPB1*04:01`) are accepted and normalized.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlStringParser;

impl GlStringParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, glstring: &str) -> EngineResult<GenotypeList> {
        let glstring = glstring.trim();
        let invalid = |reason: &str| MatchError::InvalidGlString {
            glstring: glstring.to_string(),
            reason: reason.to_string(),
        };

        if glstring.is_empty() {
            return Err(invalid("empty GL string"));
        }
        if glstring.contains('^') {
            return Err(invalid("multi-locus unphased genotypes are not supported"));
        }

        let genotypes = split_nonempty(glstring, '|', &invalid)?
            .into_iter()
            .map(|genotype| parse_genotype(genotype, &invalid))
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(GenotypeList::new(genotypes))
    }
}

impl GenotypeListResolver for GlStringParser {
    fn resolve(&self, glstring: &str) -> EngineResult<GenotypeList> {
        self.parse(glstring)
    }
}

fn parse_genotype(s: &str, invalid: &dyn Fn(&str) -> MatchError) -> EngineResult<Genotype> {
    let haplotypes = split_nonempty(s, '+', invalid)?
        .into_iter()
        .map(|haplotype| parse_haplotype(haplotype, invalid))
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(Genotype::new(haplotypes))
}

fn parse_haplotype(s: &str, invalid: &dyn Fn(&str) -> MatchError) -> EngineResult<Haplotype> {
    let allele_lists = split_nonempty(s, '~', invalid)?
        .into_iter()
        .map(|list| parse_allele_list(list, invalid))
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(Haplotype::new(allele_lists))
}

fn parse_allele_list(s: &str, invalid: &dyn Fn(&str) -> MatchError) -> EngineResult<AlleleList> {
    let alleles = split_nonempty(s, '/', invalid)?
        .into_iter()
        .map(parse_allele)
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(AlleleList::new(alleles))
}

fn split_nonempty<'s>(
    s: &'s str,
    sep: char,
    invalid: &dyn Fn(&str) -> MatchError,
) -> EngineResult<Vec<&'s str>> {
    s.split(sep)
        .map(|part| {
            let part = part.trim();
            if part.is_empty() {
                Err(invalid(&format!("empty component around '{}'", sep)))
            } else {
                Ok(part)
            }
        })
        .collect()
}

/// Validate an allele name, adding the `HLA-` prefix to shorthand such as
/// `DPB1*04:01`. Reference tables key their alleles through this too.
pub fn parse_allele(name: &str) -> EngineResult<Allele> {
    let name = name.trim();
    if name.starts_with("HLA-") || !name.contains('*') {
        Allele::new(name)
    } else {
        Allele::new(format!("HLA-{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Locus;

    #[test]
    fn test_parse_structure() {
        let gl = GlStringParser::new()
            .parse("HLA-DPB1*04:01/HLA-DPB1*04:02+HLA-DPB1*02:01|HLA-DPB1*03:01+HLA-DPB1*03:01")
            .unwrap();

        assert_eq!(gl.genotypes.len(), 2);
        assert_eq!(gl.genotypes[0].haplotypes.len(), 2);
        assert_eq!(gl.genotypes[0].haplotypes[0].allele_lists[0].alleles.len(), 2);
        assert_eq!(
            gl.to_string(),
            "HLA-DPB1*04:01/HLA-DPB1*04:02+HLA-DPB1*02:01|HLA-DPB1*03:01+HLA-DPB1*03:01"
        );
    }

    #[test]
    fn test_parse_phased_haplotype() {
        let gl = GlStringParser::new()
            .parse("HLA-DRB1*01:01~HLA-DPB1*04:01+HLA-DRB1*15:01~HLA-DPB1*02:01")
            .unwrap();
        let locus = Locus::dpb1().unwrap();
        let dpb1: Vec<&str> = gl.genotypes[0].haplotypes[1]
            .locus_alleles(&locus)
            .map(|a| a.glstring())
            .collect();
        assert_eq!(dpb1, vec!["HLA-DPB1*02:01"]);
    }

    #[test]
    fn test_normalizes_missing_prefix() {
        let gl = GlStringParser::new().parse(" DPB1*04:01 + DPB1*02:01 ").unwrap();
        assert_eq!(gl.to_string(), "HLA-DPB1*04:01+HLA-DPB1*02:01");
    }

    #[test]
    fn test_parse_allele_normalizes_shorthand() {
        assert_eq!(parse_allele("DPB1*04:01").unwrap().glstring(), "HLA-DPB1*04:01");
        assert_eq!(parse_allele(" HLA-DPB1*04:01 ").unwrap().glstring(), "HLA-DPB1*04:01");
        assert!(matches!(parse_allele("DPB1-04:01"), Err(MatchError::InvalidAllele(_))));
    }

    #[test]
    fn test_three_haplotypes_parse() {
        let gl = GlStringParser::new()
            .parse("HLA-DPB1*04:01+HLA-DPB1*02:01+HLA-DPB1*03:01")
            .unwrap();
        assert_eq!(gl.genotypes[0].haplotypes.len(), 3);
    }

    #[test]
    fn test_rejects_malformed() {
        let parser = GlStringParser::new();
        assert!(matches!(
            parser.parse(""),
            Err(MatchError::InvalidGlString { .. })
        ));
        assert!(matches!(
            parser.parse("HLA-DPB1*04:01++HLA-DPB1*02:01"),
            Err(MatchError::InvalidGlString { .. })
        ));
        assert!(matches!(
            parser.parse("HLA-DPB1*04:01^HLA-DRB1*01:01"),
            Err(MatchError::InvalidGlString { .. })
        ));
        assert!(matches!(
            parser.parse("garbage"),
            Err(MatchError::InvalidAllele(_))
        ));
    }
}
