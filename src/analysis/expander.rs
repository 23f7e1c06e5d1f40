use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::error::{EngineResult, MatchError};
use crate::reference::{FrequencyLookup, ImmuneGroupResolver};
use crate::trace::{MatchObserver, NoopObserver, Party};
use crate::types::{Allele, AllelePair, DetailRace, Genotype, GenotypeList, Haplotype, Locus};

/// Probability-weighted candidate allele pairs for one party.
///
/// Ordered so that repeated summations over the same input are bit-identical.
pub type AllelePairWeights = BTreeMap<AllelePair, f64>;

static NOOP: NoopObserver = NoopObserver;

/// Expands one party's genotype ambiguity into weighted allele pairs
pub struct AllelePairExpander<'a> {
    party: Party,
    locus: &'a Locus,
    groups: &'a dyn ImmuneGroupResolver,
    frequencies: &'a dyn FrequencyLookup,
    observer: &'a dyn MatchObserver,
}

impl<'a> AllelePairExpander<'a> {
    pub fn new(
        party: Party,
        locus: &'a Locus,
        groups: &'a dyn ImmuneGroupResolver,
        frequencies: &'a dyn FrequencyLookup,
    ) -> Self {
        Self {
            party,
            locus,
            groups,
            frequencies,
            observer: &NOOP,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn MatchObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Expand every genotype of the list, renormalizing the accumulated
    /// weights after each genotype.
    ///
    /// A repeated pair within the accumulation replaces the earlier weight.
    pub fn expand(&self, gl: &GenotypeList, race: DetailRace) -> EngineResult<AllelePairWeights> {
        let mut weights = AllelePairWeights::new();

        for genotype in &gl.genotypes {
            let (h1, h2, distinct) = haplotype_pair(genotype, gl)?;
            let candidates1: Vec<&Allele> = h1.locus_alleles(self.locus).collect();
            let candidates2: Vec<&Allele> = h2.locus_alleles(self.locus).collect();
            let unambiguous1 = candidates1.len() == 1;
            let unambiguous2 = candidates2.len() == 1;
            let mut dropped: HashSet<&Allele> = HashSet::new();

            for &a1 in &candidates1 {
                let w1 = self.weight(unambiguous1, race, a1);
                if w1 == 0.0 {
                    self.drop_candidate(&mut dropped, a1);
                    continue;
                }
                for &a2 in &candidates2 {
                    let w2 = self.weight(unambiguous2, race, a2);
                    if w2 == 0.0 {
                        self.drop_candidate(&mut dropped, a2);
                        continue;
                    }

                    let mut joint = w1 * w2;
                    if distinct {
                        joint *= 2.0;
                    }
                    let pair = AllelePair::new(
                        a1.clone(),
                        self.groups.immune_group(a1),
                        a2.clone(),
                        self.groups.immune_group(a2),
                        race,
                    );
                    self.observer.pair_expanded(self.party, &pair, w1, w2);
                    weights.insert(pair, joint);
                }
            }

            normalize(&mut weights, gl)?;
        }

        debug!(
            "{}: expanded {} allele pairs from {} genotypes",
            self.party,
            weights.len(),
            gl.genotypes.len()
        );
        Ok(weights)
    }

    fn weight(&self, unambiguous: bool, race: DetailRace, allele: &Allele) -> f64 {
        if unambiguous {
            1.0
        } else {
            self.frequencies.frequency(race, allele.glstring())
        }
    }

    fn drop_candidate<'g>(&self, dropped: &mut HashSet<&'g Allele>, allele: &'g Allele) {
        if dropped.insert(allele) {
            self.observer.candidate_dropped(self.party, allele);
        }
    }
}

/// The two haplotypes of a genotype, and whether they are distinct.
/// A single haplotype is homozygous and stands in for both.
fn haplotype_pair<'g>(
    genotype: &'g Genotype,
    gl: &GenotypeList,
) -> EngineResult<(&'g Haplotype, &'g Haplotype, bool)> {
    match genotype.haplotypes.as_slice() {
        [h1, h2] => Ok((h1, h2, h1 != h2)),
        [h] => Ok((h, h, false)),
        [] => Err(MatchError::NoHaplotypes(gl.to_string())),
        more => Err(MatchError::UnsupportedHaplotypeCount {
            count: more.len(),
            genotype_list: gl.to_string(),
        }),
    }
}

fn normalize(weights: &mut AllelePairWeights, gl: &GenotypeList) -> EngineResult<()> {
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return Err(MatchError::NoViableAllelePairs(gl.to_string()));
    }
    weights.values_mut().for_each(|w| *w /= total);
    Ok(())
}
