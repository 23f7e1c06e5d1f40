use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineResult, MatchError};

/// Name of the only locus the match engine considers
pub const DPB1_LOCUS: &str = "HLA-DPB1";

lazy_static! {
    static ref LOCUS_NAME: Regex = Regex::new(r"^HLA-[A-Z][A-Z0-9]*$").expect("valid locus regex");
    static ref ALLELE_NAME: Regex =
        Regex::new(r"^(HLA-[A-Z][A-Z0-9]*)\*([0-9A-Z]+(?::[0-9A-Z]+)*)$")
            .expect("valid allele regex");
}

/// A named gene locus, e.g. `HLA-DPB1`
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Locus(String);

impl Locus {
    pub fn new(name: impl Into<String>) -> EngineResult<Self> {
        let name = name.into();
        if LOCUS_NAME.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(MatchError::InvalidLocus(name))
        }
    }

    pub fn dpb1() -> EngineResult<Self> {
        Self::new(DPB1_LOCUS)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single allele, identified by its GL name (e.g. `HLA-DPB1*04:01`)
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Allele {
    glstring: String,
    locus: Locus,
}

impl Allele {
    pub fn new(glstring: impl Into<String>) -> EngineResult<Self> {
        let glstring = glstring.into();
        let locus = match ALLELE_NAME.captures(&glstring) {
            Some(caps) => Locus::new(&caps[1])?,
            None => return Err(MatchError::InvalidAllele(glstring)),
        };
        Ok(Self { glstring, locus })
    }

    pub fn glstring(&self) -> &str {
        &self.glstring
    }

    pub fn locus(&self) -> &Locus {
        &self.locus
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glstring)
    }
}

/// Ambiguous alleles separated by `/` in a GL string
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct AlleleList {
    pub alleles: Vec<Allele>,
}

impl AlleleList {
    pub fn new(alleles: Vec<Allele>) -> Self {
        Self { alleles }
    }
}

/// One chromosomal copy: allele lists in phase, joined by `~`
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct Haplotype {
    pub allele_lists: Vec<AlleleList>,
}

impl Haplotype {
    pub fn new(allele_lists: Vec<AlleleList>) -> Self {
        Self { allele_lists }
    }

    /// Candidate alleles on this haplotype at the given locus
    pub fn locus_alleles<'a>(&'a self, locus: &'a Locus) -> impl Iterator<Item = &'a Allele> + 'a {
        self.allele_lists
            .iter()
            .flat_map(|al| al.alleles.iter())
            .filter(move |a| a.locus() == locus)
    }
}

/// One phase hypothesis: haplotypes joined by `+`
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct Genotype {
    pub haplotypes: Vec<Haplotype>,
}

impl Genotype {
    pub fn new(haplotypes: Vec<Haplotype>) -> Self {
        Self { haplotypes }
    }
}

/// Alternative genotype interpretations for one individual, joined by `|`
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct GenotypeList {
    pub genotypes: Vec<Genotype>,
}

impl GenotypeList {
    pub fn new(genotypes: Vec<Genotype>) -> Self {
        Self { genotypes }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for AlleleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.alleles, "/")
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.allele_lists, "~")
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.haplotypes, "+")
    }
}

impl fmt::Display for GenotypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.genotypes, "|")
    }
}

/// T-cell epitope immunogenicity group of an allele.
///
/// `Unassigned` is the reserved "no elevated group" marker and orders below
/// every numbered group. An allele whose group could not be resolved at all
/// is represented as `None` wherever an `Option<ImmuneGroup>` is carried.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ImmuneGroup {
    Unassigned,
    Group(u32),
}

impl ImmuneGroup {
    pub fn is_unassigned(&self) -> bool {
        matches!(self, ImmuneGroup::Unassigned)
    }
}

impl fmt::Display for ImmuneGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmuneGroup::Unassigned => f.write_str("-"),
            ImmuneGroup::Group(n) => write!(f, "{}", n),
        }
    }
}

/// NMDP detailed race categories used to select allele frequencies
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, Hash, Eq, PartialEq, PartialOrd, Ord,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetailRace {
    Aafa,
    Afb,
    Aindi,
    Aisc,
    Alanam,
    Amind,
    Carb,
    Carhis,
    Caribi,
    Eurcau,
    Filii,
    Hawi,
    Japi,
    Kori,
    Menafc,
    Mswhis,
    Namer,
    Nchi,
    Scahis,
    Scamb,
    Scseai,
    Viet,
    #[default]
    Unk,
}

impl DetailRace {
    pub const ALL: [DetailRace; 23] = [
        DetailRace::Aafa,
        DetailRace::Afb,
        DetailRace::Aindi,
        DetailRace::Aisc,
        DetailRace::Alanam,
        DetailRace::Amind,
        DetailRace::Carb,
        DetailRace::Carhis,
        DetailRace::Caribi,
        DetailRace::Eurcau,
        DetailRace::Filii,
        DetailRace::Hawi,
        DetailRace::Japi,
        DetailRace::Kori,
        DetailRace::Menafc,
        DetailRace::Mswhis,
        DetailRace::Namer,
        DetailRace::Nchi,
        DetailRace::Scahis,
        DetailRace::Scamb,
        DetailRace::Scseai,
        DetailRace::Viet,
        DetailRace::Unk,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DetailRace::Aafa => "AAFA",
            DetailRace::Afb => "AFB",
            DetailRace::Aindi => "AINDI",
            DetailRace::Aisc => "AISC",
            DetailRace::Alanam => "ALANAM",
            DetailRace::Amind => "AMIND",
            DetailRace::Carb => "CARB",
            DetailRace::Carhis => "CARHIS",
            DetailRace::Caribi => "CARIBI",
            DetailRace::Eurcau => "EURCAU",
            DetailRace::Filii => "FILII",
            DetailRace::Hawi => "HAWI",
            DetailRace::Japi => "JAPI",
            DetailRace::Kori => "KORI",
            DetailRace::Menafc => "MENAFC",
            DetailRace::Mswhis => "MSWHIS",
            DetailRace::Namer => "NAMER",
            DetailRace::Nchi => "NCHI",
            DetailRace::Scahis => "SCAHIS",
            DetailRace::Scamb => "SCAMB",
            DetailRace::Scseai => "SCSEAI",
            DetailRace::Viet => "VIET",
            DetailRace::Unk => "UNK",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DetailRace::Aafa => "African American",
            DetailRace::Afb => "African",
            DetailRace::Aindi => "South Asian Indian",
            DetailRace::Aisc => "American Indian - South or Central America",
            DetailRace::Alanam => "Alaska Native or Aleut",
            DetailRace::Amind => "North American Indian",
            DetailRace::Carb => "Black Caribbean",
            DetailRace::Carhis => "Caribbean Hispanic",
            DetailRace::Caribi => "Caribbean Indian",
            DetailRace::Eurcau => "European Caucasian",
            DetailRace::Filii => "Filipino",
            DetailRace::Hawi => "Native Hawaiian or Pacific Islander",
            DetailRace::Japi => "Japanese",
            DetailRace::Kori => "Korean",
            DetailRace::Menafc => "Middle Eastern or North Coast of Africa",
            DetailRace::Mswhis => "Mexican or Chicano",
            DetailRace::Namer => "North American",
            DetailRace::Nchi => "Chinese",
            DetailRace::Scahis => "Hispanic - South or Central American",
            DetailRace::Scamb => "Black - South or Central American",
            DetailRace::Scseai => "Southeast Asian",
            DetailRace::Viet => "Vietnamese",
            DetailRace::Unk => "Unknown",
        }
    }
}

impl FromStr for DetailRace {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        DetailRace::ALL
            .iter()
            .copied()
            .find(|race| race.code() == code)
            .ok_or_else(|| MatchError::UnknownRace(s.to_string()))
    }
}

impl fmt::Display for DetailRace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One candidate two-allele assignment for a party's genotype, with the
/// immune groups resolved for each allele. Used only as a mapping key.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct AllelePair {
    allele1: Allele,
    group1: Option<ImmuneGroup>,
    allele2: Allele,
    group2: Option<ImmuneGroup>,
    race: DetailRace,
}

impl AllelePair {
    pub fn new(
        allele1: Allele,
        group1: Option<ImmuneGroup>,
        allele2: Allele,
        group2: Option<ImmuneGroup>,
        race: DetailRace,
    ) -> Self {
        Self {
            allele1,
            group1,
            allele2,
            group2,
            race,
        }
    }

    pub fn allele1(&self) -> &Allele {
        &self.allele1
    }

    pub fn allele2(&self) -> &Allele {
        &self.allele2
    }

    pub fn group1(&self) -> Option<ImmuneGroup> {
        self.group1
    }

    pub fn group2(&self) -> Option<ImmuneGroup> {
        self.group2
    }

    pub fn race(&self) -> DetailRace {
        self.race
    }

    /// The smaller of the two groups, `None` unless both are resolved
    pub fn low_group(&self) -> Option<ImmuneGroup> {
        Some(min(self.group1?, self.group2?))
    }

    /// The larger of the two groups, `None` unless both are resolved
    pub fn high_group(&self) -> Option<ImmuneGroup> {
        Some(max(self.group1?, self.group2?))
    }

    /// Same alleles in the same order, ignoring groups and race
    pub fn type_equals(&self, other: &AllelePair) -> bool {
        self.allele1 == other.allele1 && self.allele2 == other.allele2
    }
}

fn fmt_group(group: Option<ImmuneGroup>) -> String {
    group.map_or_else(|| "?".to_string(), |g| g.to_string())
}

impl fmt::Display for AllelePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(g:{})+{}(g:{})",
            self.allele1,
            fmt_group(self.group1),
            self.allele2,
            fmt_group(self.group2)
        )
    }
}

/// Outcome of comparing recipient and donor allele pairs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchGrade {
    Match,
    Permissive,
    HvgNonpermissive,
    GvhNonpermissive,
    Unknown,
    /// Mixture including a match or permissive outcome
    Potential,
    /// Mixture of non-permissive and/or unknown outcomes
    NonpermissiveUndefined,
}

impl MatchGrade {
    /// Grades a single recipient/donor pair comparison can produce
    pub const PURE: [MatchGrade; 5] = [
        MatchGrade::Match,
        MatchGrade::Permissive,
        MatchGrade::HvgNonpermissive,
        MatchGrade::GvhNonpermissive,
        MatchGrade::Unknown,
    ];

    /// Position of this grade in [`MatchGrade::PURE`]
    pub fn pure_index(&self) -> Option<usize> {
        match self {
            MatchGrade::Match => Some(0),
            MatchGrade::Permissive => Some(1),
            MatchGrade::HvgNonpermissive => Some(2),
            MatchGrade::GvhNonpermissive => Some(3),
            MatchGrade::Unknown => Some(4),
            MatchGrade::Potential | MatchGrade::NonpermissiveUndefined => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchGrade::Match => "MATCH",
            MatchGrade::Permissive => "PERMISSIVE",
            MatchGrade::HvgNonpermissive => "HVG_NONPERMISSIVE",
            MatchGrade::GvhNonpermissive => "GVH_NONPERMISSIVE",
            MatchGrade::Unknown => "UNKNOWN",
            MatchGrade::Potential => "POTENTIAL",
            MatchGrade::NonpermissiveUndefined => "NONPERMISSIVE_UNDEFINED",
        }
    }
}

impl fmt::Display for MatchGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounded grade probabilities and the overall grade for one comparison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub match_probability: f64,
    pub permissive_probability: f64,
    pub hvg_probability: f64,
    pub gvh_probability: f64,
    pub unknown_probability: f64,
    pub grade: MatchGrade,
}

impl MatchResult {
    /// Probability carried by a pure grade; mixture grades carry none
    pub fn probability(&self, grade: MatchGrade) -> f64 {
        match grade {
            MatchGrade::Match => self.match_probability,
            MatchGrade::Permissive => self.permissive_probability,
            MatchGrade::HvgNonpermissive => self.hvg_probability,
            MatchGrade::GvhNonpermissive => self.gvh_probability,
            MatchGrade::Unknown => self.unknown_probability,
            MatchGrade::Potential | MatchGrade::NonpermissiveUndefined => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allele(name: &str) -> Allele {
        Allele::new(name).unwrap()
    }

    #[test]
    fn test_allele_locus() {
        let a = allele("HLA-DPB1*04:01");
        assert_eq!(a.locus().name(), DPB1_LOCUS);
        assert_eq!(a.glstring(), "HLA-DPB1*04:01");
        assert_eq!(allele("HLA-A*01:01:01:01").locus().name(), "HLA-A");
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(
            Allele::new("DPB1-04:01"),
            Err(MatchError::InvalidAllele("DPB1-04:01".to_string()))
        );
        assert!(Locus::new("dpb1").is_err());
        assert!(Locus::dpb1().is_ok());
    }

    #[test]
    fn test_unassigned_orders_below_groups() {
        assert!(ImmuneGroup::Unassigned < ImmuneGroup::Group(0));
        assert!(ImmuneGroup::Group(1) < ImmuneGroup::Group(3));
    }

    #[test]
    fn test_low_high_group() {
        let pair = AllelePair::new(
            allele("HLA-DPB1*04:01"),
            Some(ImmuneGroup::Group(3)),
            allele("HLA-DPB1*09:01"),
            Some(ImmuneGroup::Unassigned),
            DetailRace::Unk,
        );
        assert_eq!(pair.low_group(), Some(ImmuneGroup::Unassigned));
        assert_eq!(pair.high_group(), Some(ImmuneGroup::Group(3)));

        let unresolved = AllelePair::new(
            allele("HLA-DPB1*04:01"),
            Some(ImmuneGroup::Group(3)),
            allele("HLA-DPB1*999:01"),
            None,
            DetailRace::Unk,
        );
        assert_eq!(unresolved.low_group(), None);
        assert_eq!(unresolved.high_group(), None);
    }

    #[test]
    fn test_pair_equality_is_order_sensitive() {
        let a = allele("HLA-DPB1*04:01");
        let b = allele("HLA-DPB1*02:01");
        let g = Some(ImmuneGroup::Group(3));
        let ab = AllelePair::new(a.clone(), g, b.clone(), g, DetailRace::Unk);
        let ba = AllelePair::new(b, g, a, g, DetailRace::Unk);
        assert_ne!(ab, ba);
        assert!(!ab.type_equals(&ba));
    }

    #[test]
    fn test_race_codes() {
        assert_eq!("eurcau".parse::<DetailRace>(), Ok(DetailRace::Eurcau));
        assert_eq!(" UNK ".parse::<DetailRace>(), Ok(DetailRace::Unk));
        assert!("martian".parse::<DetailRace>().is_err());
        assert_eq!(DetailRace::default(), DetailRace::Unk);
    }

    #[test]
    fn test_genotype_list_display() {
        let h1 = Haplotype::new(vec![AlleleList::new(vec![
            allele("HLA-DPB1*04:01"),
            allele("HLA-DPB1*04:02"),
        ])]);
        let h2 = Haplotype::new(vec![AlleleList::new(vec![allele("HLA-DPB1*02:01")])]);
        let gl = GenotypeList::new(vec![Genotype::new(vec![h1, h2])]);
        assert_eq!(
            gl.to_string(),
            "HLA-DPB1*04:01/HLA-DPB1*04:02+HLA-DPB1*02:01"
        );
    }
}
