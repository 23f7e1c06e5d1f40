//! Diagnostic observers for the match engine.
//!
//! Observers only receive notifications; they never influence the computed
//! probabilities.

use parking_lot::Mutex;
use std::fmt;

use crate::types::{Allele, AllelePair, MatchGrade};

/// Which party an expansion notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Recipient,
    Donor,
}

impl Party {
    pub fn prefix(&self) -> &'static str {
        match self {
            Party::Recipient => "r",
            Party::Donor => "d",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Receives per-candidate and per-pair notifications during a match
pub trait MatchObserver: Send + Sync {
    /// A candidate allele had zero frequency and was dropped (once per genotype)
    fn candidate_dropped(&self, _party: Party, _allele: &Allele) {}

    /// A weighted candidate pair was produced by expansion
    fn pair_expanded(&self, _party: Party, _pair: &AllelePair, _w1: f64, _w2: f64) {}

    /// A recipient/donor pair was classified during aggregation
    fn pair_classified(
        &self,
        _recipient: (&AllelePair, f64),
        _donor: (&AllelePair, f64),
        _grade: MatchGrade,
        _probability: f64,
    ) {
    }
}

/// Ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MatchObserver for NoopObserver {}

/// Forwards notifications to `tracing` at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MatchObserver for TracingObserver {
    fn candidate_dropped(&self, party: Party, allele: &Allele) {
        tracing::trace!("{}", dropped_line(party, allele));
    }

    fn pair_expanded(&self, party: Party, pair: &AllelePair, w1: f64, w2: f64) {
        tracing::trace!("{}", expanded_line(party, pair, w1, w2));
    }

    fn pair_classified(
        &self,
        recipient: (&AllelePair, f64),
        donor: (&AllelePair, f64),
        grade: MatchGrade,
        probability: f64,
    ) {
        tracing::trace!("{}", classified_line(recipient, donor, grade, probability));
    }
}

/// Collects human-readable explanation lines in notification order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    lines: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl MatchObserver for RecordingObserver {
    fn candidate_dropped(&self, party: Party, allele: &Allele) {
        self.lines.lock().push(dropped_line(party, allele));
    }

    fn pair_expanded(&self, party: Party, pair: &AllelePair, w1: f64, w2: f64) {
        self.lines.lock().push(expanded_line(party, pair, w1, w2));
    }

    fn pair_classified(
        &self,
        recipient: (&AllelePair, f64),
        donor: (&AllelePair, f64),
        grade: MatchGrade,
        probability: f64,
    ) {
        self.lines
            .lock()
            .push(classified_line(recipient, donor, grade, probability));
    }
}

fn dropped_line(party: Party, allele: &Allele) -> String {
    format!("{}:{}(p:0.0,dropped)", party, allele)
}

fn expanded_line(party: Party, pair: &AllelePair, w1: f64, w2: f64) -> String {
    format!("{}:{}:p:{}*{}", party, pair, w1, w2)
}

fn classified_line(
    recipient: (&AllelePair, f64),
    donor: (&AllelePair, f64),
    grade: MatchGrade,
    probability: f64,
) -> String {
    format!(
        "m:r:{}:p:{},d:{}:p:{},m:{}(p:{})",
        recipient.0, recipient.1, donor.0, donor.1, grade, probability
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetailRace, ImmuneGroup};

    #[test]
    fn test_recording_observer_lines() {
        let observer = RecordingObserver::new();
        let a = Allele::new("HLA-DPB1*04:01").unwrap();
        let b = Allele::new("HLA-DPB1*02:01").unwrap();
        let pair = AllelePair::new(
            a.clone(),
            Some(ImmuneGroup::Group(3)),
            b,
            None,
            DetailRace::Unk,
        );

        observer.candidate_dropped(Party::Donor, &a);
        observer.pair_expanded(Party::Recipient, &pair, 1.0, 0.5);
        observer.pair_classified((&pair, 0.5), (&pair, 1.0), MatchGrade::Match, 0.5);

        assert_eq!(
            observer.lines(),
            vec![
                "d:HLA-DPB1*04:01(p:0.0,dropped)".to_string(),
                "r:HLA-DPB1*04:01(g:3)+HLA-DPB1*02:01(g:?):p:1*0.5".to_string(),
                "m:r:HLA-DPB1*04:01(g:3)+HLA-DPB1*02:01(g:?):p:0.5,\
                 d:HLA-DPB1*04:01(g:3)+HLA-DPB1*02:01(g:?):p:1,m:MATCH(p:0.5)"
                    .to_string(),
            ]
        );

        observer.clear();
        assert!(observer.lines().is_empty());
    }
}
