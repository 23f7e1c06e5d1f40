//! HLA-DPB1 match probability engine.
//!
//! [`MatchService`] expands each party's genotype list into weighted allele
//! pairs, cross-classifies every recipient/donor combination and reduces the
//! result to a rounded grade distribution plus one overall grade.

mod aggregator;
mod expander;
mod grade;

pub use aggregator::MatchAggregator;
pub use expander::{AllelePairExpander, AllelePairWeights};
pub use grade::{classify, resolve_overall_grade, GradeFlags};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info_span, warn};

use crate::error::{EngineResult, MatchError};
use crate::reference::{
    FrequencyLookup, GenotypeListResolver, GlStringTransformer, ImmuneGroupResolver,
};
use crate::trace::{MatchObserver, NoopObserver, Party};
use crate::transform::AlleleTrimmer;
use crate::types::{AllelePair, DetailRace, GenotypeList, Locus, MatchGrade, MatchResult};

/// One recipient/donor comparison requested in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRequest {
    pub id: String,
    pub recipient: String,
    pub recipient_race: Option<DetailRace>,
    pub donor: String,
    pub donor_race: Option<DetailRace>,
}

/// Result of one batch comparison; failures are reported per request
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub id: String,
    pub result: Result<MatchResult, MatchError>,
}

/// Computes match grades between recipients and donors
pub struct MatchService {
    transformer: Arc<dyn GlStringTransformer>,
    genotype_lists: Arc<dyn GenotypeListResolver>,
    groups: Arc<dyn ImmuneGroupResolver>,
    frequencies: Arc<dyn FrequencyLookup>,
    observer: Arc<dyn MatchObserver>,
    locus: Locus,
    aggregator: MatchAggregator,
}

impl MatchService {
    /// Fails if the DPB1 locus cannot be created or the precision is invalid
    pub fn new(
        genotype_lists: Arc<dyn GenotypeListResolver>,
        groups: Arc<dyn ImmuneGroupResolver>,
        frequencies: Arc<dyn FrequencyLookup>,
        precision: f64,
    ) -> EngineResult<Self> {
        Ok(Self {
            transformer: Arc::new(AlleleTrimmer::new()),
            genotype_lists,
            groups,
            frequencies,
            observer: Arc::new(NoopObserver),
            locus: Locus::dpb1()?,
            aggregator: MatchAggregator::new(precision)?,
        })
    }

    /// Attach an observer to every comparison this service runs.
    ///
    /// [`MatchService::get_matches`] calls it from several threads at once, so
    /// a recording observer only yields a readable trace for single
    /// comparisons. [`crate::trace::TracingObserver`] output is tagged with
    /// the request id by the batch span.
    pub fn with_observer(mut self, observer: Arc<dyn MatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the default [`AlleleTrimmer`] applied to GL strings before
    /// they are resolved
    pub fn with_transformer(mut self, transformer: Arc<dyn GlStringTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Transform and resolve both GL strings, then compute the match
    pub fn get_match_gl(
        &self,
        recipient_gl: &str,
        recipient_race: Option<DetailRace>,
        donor_gl: &str,
        donor_race: Option<DetailRace>,
    ) -> EngineResult<MatchResult> {
        let recipient = self.resolve(recipient_gl)?;
        let donor = self.resolve(donor_gl)?;
        self.get_match(&recipient, recipient_race, &donor, donor_race)
    }

    fn resolve(&self, glstring: &str) -> EngineResult<GenotypeList> {
        let transformed = self.transformer.transform(glstring)?;
        self.genotype_lists.resolve(&transformed)
    }

    /// Compute the match between two genotype lists; missing races are `Unk`
    pub fn get_match(
        &self,
        recipient: &GenotypeList,
        recipient_race: Option<DetailRace>,
        donor: &GenotypeList,
        donor_race: Option<DetailRace>,
    ) -> EngineResult<MatchResult> {
        let recipient_pairs =
            self.allele_pairs(recipient, recipient_race.unwrap_or_default(), Party::Recipient)?;
        let donor_pairs = self.allele_pairs(donor, donor_race.unwrap_or_default(), Party::Donor)?;
        let result = self.aggregator.aggregate_observed(
            &recipient_pairs,
            &donor_pairs,
            self.observer.as_ref(),
        )?;
        debug!("r:{} d:{} -> {}", recipient, donor, result.grade);
        Ok(result)
    }

    /// Weighted candidate allele pairs for one party
    pub fn allele_pairs(
        &self,
        gl: &GenotypeList,
        race: DetailRace,
        party: Party,
    ) -> EngineResult<AllelePairWeights> {
        AllelePairExpander::new(
            party,
            &self.locus,
            self.groups.as_ref(),
            self.frequencies.as_ref(),
        )
        .with_observer(self.observer.as_ref())
        .expand(gl, race)
    }

    pub fn classify(&self, recipient: &AllelePair, donor: &AllelePair) -> MatchGrade {
        classify(recipient, donor)
    }

    /// Match many requests in parallel, keeping the input order
    pub fn get_matches(&self, requests: &[MatchRequest]) -> Vec<MatchOutcome> {
        requests
            .par_iter()
            .map(|request| {
                let _span = info_span!("request", id = %request.id).entered();
                let result = self.get_match_gl(
                    &request.recipient,
                    request.recipient_race,
                    &request.donor,
                    request.donor_race,
                );
                if let Err(e) = &result {
                    warn!("Failed to match {}: {}", request.id, e);
                }
                MatchOutcome {
                    id: request.id.clone(),
                    result,
                }
            })
            .collect()
    }
}
