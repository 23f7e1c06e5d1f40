//! Error types for the match engine

use thiserror::Error;

/// Errors raised while resolving, expanding or aggregating genotype data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// A locus handle could not be created; fatal at service construction
    #[error("unable to create locus '{0}'")]
    InvalidLocus(String),

    /// An allele name is not of the form `LOCUS*FIELDS`
    #[error("invalid allele name '{0}'")]
    InvalidAllele(String),

    /// A GL string could not be parsed into a genotype list
    #[error("invalid GL string '{glstring}': {reason}")]
    InvalidGlString { glstring: String, reason: String },

    #[error("no haplotypes found for genotype list: {0}")]
    NoHaplotypes(String),

    #[error("only expecting 2 haplotypes, found {count} for genotype list: {genotype_list}")]
    UnsupportedHaplotypeCount { count: usize, genotype_list: String },

    /// Every candidate allele pair was dropped with a zero weight
    #[error("no viable allele pairs for genotype list: {0}")]
    NoViableAllelePairs(String),

    /// No grade carried any probability after aggregation
    #[error("no recognized match grades possible")]
    NoGradeResolved,

    #[error("unknown race code '{0}'")]
    UnknownRace(String),

    #[error("match probability precision must be within (0, 1], got {0}")]
    InvalidPrecision(f64),
}

pub type EngineResult<T> = std::result::Result<T, MatchError>;
