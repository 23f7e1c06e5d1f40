//! # DPB1 Match
//!
//! Probabilistic HLA-DPB1 T-cell epitope matching between a transplant
//! recipient and a donor.
//!
//! ## Features
//!
//! - Trimming of high-resolution typings to two-field names, with optional G groups
//! - Expansion of ambiguous GL strings into frequency-weighted allele pairs
//! - Directional (HvG / GvH) immune group classification of allele pairs
//! - Rounded match grade distributions with a single overall grade
//! - Immune group and allele frequency tables loaded from TSV/CSV (optionally gzipped)
//! - Parallel batch matching with JSON, CSV and TSV reports

pub mod analysis;
pub mod config;
pub mod error;
pub mod output;
pub mod parsers;
pub mod reference;
pub mod trace;
pub mod transform;
pub mod types;

// Re-export key types
pub use analysis::{
    AllelePairExpander, AllelePairWeights, MatchAggregator, MatchOutcome, MatchRequest,
    MatchService,
};
pub use config::MatchConfig;
pub use error::{EngineResult, MatchError};
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{
    FrequencyParser, GGroupParser, GlStringParser, ImmuneGroupParser, RequestParser,
};
pub use reference::{
    CachingImmuneGroupResolver, FrequencyLookup, FrequencyTable, GGroupTable, GenotypeListResolver,
    GlStringTransformer, ImmuneGroupResolver, ImmuneGroupTable,
};
pub use trace::{MatchObserver, NoopObserver, Party, RecordingObserver, TracingObserver};
pub use transform::AlleleTrimmer;
pub use types::*;
