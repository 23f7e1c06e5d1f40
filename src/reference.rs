//! Reference data collaborators consulted by the match engine.
//!
//! The engine only sees the traits defined here. The in-memory tables are
//! loaded from delimited files by [`crate::parsers`].

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

use crate::error::EngineResult;
use crate::types::{Allele, DetailRace, GenotypeList, ImmuneGroup};

/// Default frequency returned for alleles missing from a frequency table
pub const DEFAULT_BASELINE_FREQUENCY: f64 = 0.00001;

/// Parses GL strings into genotype lists
pub trait GenotypeListResolver: Send + Sync {
    fn resolve(&self, glstring: &str) -> EngineResult<GenotypeList>;
}

/// Resolves the immune group of an allele; `None` when it cannot be resolved
pub trait ImmuneGroupResolver: Send + Sync {
    fn immune_group(&self, allele: &Allele) -> Option<ImmuneGroup>;
}

/// Population frequency of an allele for a race, in `[0, 1]`.
/// A frequency of `0.0` means the allele is not observed for that race.
pub trait FrequencyLookup: Send + Sync {
    fn frequency(&self, race: DetailRace, allele: &str) -> f64;
}

/// Rewrites a GL string before it is resolved, e.g. to coarsen allele names
pub trait GlStringTransformer: Send + Sync {
    fn transform(&self, glstring: &str) -> EngineResult<String>;
}

/// Immune groups keyed by allele name
#[derive(Debug, Clone, Default)]
pub struct ImmuneGroupTable {
    groups: BTreeMap<String, Option<ImmuneGroup>>,
}

impl ImmuneGroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allele; a `None` group lists the allele without a resolvable group
    pub fn insert(&mut self, allele: impl Into<String>, group: Option<ImmuneGroup>) {
        self.groups.insert(allele.into(), group);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All known alleles with their groups, in allele-name order
    pub fn alleles(&self) -> impl Iterator<Item = (&str, Option<ImmuneGroup>)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), *group))
    }

    /// Alleles belonging to any of the given groups, grouped in the order requested
    pub fn alleles_in_groups(&self, groups: &[ImmuneGroup]) -> Vec<(&str, ImmuneGroup)> {
        groups
            .iter()
            .flat_map(|wanted| {
                self.groups.iter().filter_map(move |(name, group)| match group {
                    Some(g) if g == wanted => Some((name.as_str(), *g)),
                    _ => None,
                })
            })
            .collect()
    }
}

impl ImmuneGroupResolver for ImmuneGroupTable {
    fn immune_group(&self, allele: &Allele) -> Option<ImmuneGroup> {
        self.groups.get(allele.glstring()).copied().flatten()
    }
}

/// G group names keyed by member allele, e.g.
/// `HLA-DPB1*04:01:01:01` -> `HLA-DPB1*04:01:01G`
#[derive(Debug, Clone, Default)]
pub struct GGroupTable {
    groups: BTreeMap<String, String>,
}

impl GGroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, allele: impl Into<String>, g_group: impl Into<String>) {
        self.groups.insert(allele.into(), g_group.into());
    }

    pub fn g_group(&self, allele: &str) -> Option<&str> {
        self.groups.get(allele).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Allele frequencies per race, with a baseline for unlisted alleles
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    frequencies: HashMap<(DetailRace, String), f64>,
    baseline: f64,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_FREQUENCY)
    }
}

impl FrequencyTable {
    pub fn new(baseline: f64) -> Self {
        Self {
            frequencies: HashMap::new(),
            baseline,
        }
    }

    pub fn insert(&mut self, race: DetailRace, allele: impl Into<String>, frequency: f64) {
        self.frequencies.insert((race, allele.into()), frequency);
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

impl FrequencyLookup for FrequencyTable {
    fn frequency(&self, race: DetailRace, allele: &str) -> f64 {
        self.frequencies
            .get(&(race, allele.to_string()))
            .copied()
            .unwrap_or(self.baseline)
    }
}

/// Memoizes lookups of another resolver, safe for concurrent readers
pub struct CachingImmuneGroupResolver<R> {
    inner: R,
    cache: DashMap<Allele, Option<ImmuneGroup>>,
}

impl<R: ImmuneGroupResolver> CachingImmuneGroupResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl<R: ImmuneGroupResolver> ImmuneGroupResolver for CachingImmuneGroupResolver<R> {
    fn immune_group(&self, allele: &Allele) -> Option<ImmuneGroup> {
        if let Some(group) = self.cache.get(allele) {
            return *group;
        }
        let group = self.inner.immune_group(allele);
        self.cache.insert(allele.clone(), group);
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl ImmuneGroupResolver for CountingResolver {
        fn immune_group(&self, _allele: &Allele) -> Option<ImmuneGroup> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(ImmuneGroup::Group(2))
        }
    }

    #[test]
    fn test_group_table_lookup() {
        let mut table = ImmuneGroupTable::new();
        table.insert("HLA-DPB1*04:01", Some(ImmuneGroup::Group(3)));
        table.insert("HLA-DPB1*02:01", Some(ImmuneGroup::Unassigned));
        table.insert("HLA-DPB1*85:01", None);

        let lookup = |name: &str| table.immune_group(&Allele::new(name).unwrap());
        assert_eq!(lookup("HLA-DPB1*04:01"), Some(ImmuneGroup::Group(3)));
        assert_eq!(lookup("HLA-DPB1*02:01"), Some(ImmuneGroup::Unassigned));
        assert_eq!(lookup("HLA-DPB1*85:01"), None);
        assert_eq!(lookup("HLA-DPB1*999:01"), None);
    }

    #[test]
    fn test_alleles_in_groups_keeps_request_order() {
        let mut table = ImmuneGroupTable::new();
        table.insert("HLA-DPB1*09:01", Some(ImmuneGroup::Group(1)));
        table.insert("HLA-DPB1*03:01", Some(ImmuneGroup::Group(2)));
        table.insert("HLA-DPB1*04:01", Some(ImmuneGroup::Group(3)));
        table.insert("HLA-DPB1*10:01", Some(ImmuneGroup::Group(1)));

        let names: Vec<&str> = table
            .alleles_in_groups(&[ImmuneGroup::Group(2), ImmuneGroup::Group(1)])
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec!["HLA-DPB1*03:01", "HLA-DPB1*09:01", "HLA-DPB1*10:01"]
        );
    }

    #[test]
    fn test_frequency_baseline() {
        let mut table = FrequencyTable::new(0.001);
        table.insert(DetailRace::Eurcau, "HLA-DPB1*04:01", 0.4);
        table.insert(DetailRace::Eurcau, "HLA-DPB1*13:01", 0.0);

        assert_eq!(table.frequency(DetailRace::Eurcau, "HLA-DPB1*04:01"), 0.4);
        assert_eq!(table.frequency(DetailRace::Eurcau, "HLA-DPB1*13:01"), 0.0);
        assert_eq!(table.frequency(DetailRace::Nchi, "HLA-DPB1*04:01"), 0.001);
    }

    #[test]
    fn test_caching_resolver_hits_inner_once() {
        let resolver = CachingImmuneGroupResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let allele = Allele::new("HLA-DPB1*04:01").unwrap();

        assert_eq!(resolver.immune_group(&allele), Some(ImmuneGroup::Group(2)));
        assert_eq!(resolver.immune_group(&allele), Some(ImmuneGroup::Group(2)));
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_len(), 1);
    }
}
