use tracing::{debug, trace};

use super::expander::AllelePairWeights;
use super::grade::{classify, resolve_overall_grade, GradeFlags};
use crate::error::{EngineResult, MatchError};
use crate::trace::{MatchObserver, NoopObserver};
use crate::types::{MatchGrade, MatchResult};

/// Running probability per pure grade, indexed by [`MatchGrade::pure_index`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GradeTotals([f64; 5]);

impl GradeTotals {
    fn add(&mut self, grade: MatchGrade, p: f64) -> EngineResult<()> {
        let slot = grade.pure_index().ok_or(MatchError::NoGradeResolved)?;
        self.0[slot] += p;
        Ok(())
    }

    fn get(&self, grade: MatchGrade) -> f64 {
        grade.pure_index().map_or(0.0, |slot| self.0[slot])
    }

    fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    fn flags(&self) -> GradeFlags {
        GradeFlags {
            matched: self.get(MatchGrade::Match) > 0.0,
            permissive: self.get(MatchGrade::Permissive) > 0.0,
            hvg: self.get(MatchGrade::HvgNonpermissive) > 0.0,
            gvh: self.get(MatchGrade::GvhNonpermissive) > 0.0,
            unknown: self.get(MatchGrade::Unknown) > 0.0,
        }
    }
}

/// Cross-classifies both parties' allele pairs into a rounded distribution
#[derive(Debug, Clone, Copy)]
pub struct MatchAggregator {
    resolution: f64,
}

impl MatchAggregator {
    /// `precision` is the rounding step of reported probabilities, e.g. `0.01`
    pub fn new(precision: f64) -> EngineResult<Self> {
        if !(precision > 0.0 && precision <= 1.0) {
            return Err(MatchError::InvalidPrecision(precision));
        }
        // subnormal precisions overflow the resolution
        let resolution = (1.0 / precision).round();
        if !resolution.is_finite() {
            return Err(MatchError::InvalidPrecision(precision));
        }
        Ok(Self { resolution })
    }

    /// Rounding resolution `R`; reported probabilities are multiples of `1/R`
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn aggregate(
        &self,
        recipient: &AllelePairWeights,
        donor: &AllelePairWeights,
    ) -> EngineResult<MatchResult> {
        self.aggregate_observed(recipient, donor, &NoopObserver)
    }

    pub fn aggregate_observed(
        &self,
        recipient: &AllelePairWeights,
        donor: &AllelePairWeights,
        observer: &dyn MatchObserver,
    ) -> EngineResult<MatchResult> {
        let mut totals = GradeTotals::default();

        for (rp, &rw) in recipient {
            for (dp, &dw) in donor {
                let grade = classify(rp, dp);
                let p = rw * dw;
                trace!("Matched:rp:{},dp:{} -> {}", rp, dp, grade);
                observer.pair_classified((rp, rw), (dp, dw), grade, p);
                totals.add(grade, p)?;
            }
        }

        let total = totals.total();
        if total <= 0.0 {
            return Err(MatchError::NoGradeResolved);
        }
        let mut rounded = GradeTotals::default();
        for grade in MatchGrade::PURE {
            rounded.add(grade, self.round(totals.get(grade) / total))?;
        }
        debug!("finished with: {:?}", rounded.0);

        let grade = resolve_overall_grade(rounded.flags())?;
        Ok(MatchResult {
            match_probability: rounded.get(MatchGrade::Match),
            permissive_probability: rounded.get(MatchGrade::Permissive),
            hvg_probability: rounded.get(MatchGrade::HvgNonpermissive),
            gvh_probability: rounded.get(MatchGrade::GvhNonpermissive),
            unknown_probability: rounded.get(MatchGrade::Unknown),
            grade,
        })
    }

    fn round(&self, value: f64) -> f64 {
        (value * self.resolution).round() / self.resolution
    }
}
