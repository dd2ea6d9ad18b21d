//! UNSAT containment cache and the pipeline stage that consults it

use super::result::SolverResult;
use super::solver::Solver;
use super::termination::TerminationCriterion;
use crate::station::StationPackingInstance;
use log::debug;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// A store of instances known to be UNSAT, queried for one that proves a new instance UNSAT
pub trait ContainmentCache: Send + Sync {
    /// Key of a cached UNSAT instance that implies `instance` is UNSAT
    fn prove_unsat_by_subset(&self, instance: &StationPackingInstance) -> Option<String>;

    /// Remember that `instance` is UNSAT
    fn insert_unsat(&self, instance: &StationPackingInstance);
}

/// Whether `cached` being UNSAT implies `query` is UNSAT.
///
/// Holds when every cached station is in the query and no query domain is wider than
/// the cached one: the query then contains a restriction of the cached instance.
pub fn proves_unsat(cached: &StationPackingInstance, query: &StationPackingInstance) -> bool {
    cached.domains().iter().all(|(&station, cached_domain)| {
        query
            .domain(station)
            .is_some_and(|domain| domain.is_subset(cached_domain))
    })
}

/// Linear-scan cache kept in memory
#[derive(Debug, Default)]
pub struct InMemoryUnsatCache {
    entries: RwLock<Vec<(String, StationPackingInstance)>>,
}

impl InMemoryUnsatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContainmentCache for InMemoryUnsatCache {
    fn prove_unsat_by_subset(&self, instance: &StationPackingInstance) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|(_, cached)| proves_unsat(cached, instance))
            .map(|(key, _)| key.clone())
    }

    fn insert_unsat(&self, instance: &StationPackingInstance) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|(_, cached)| proves_unsat(cached, instance)) {
            return;
        }
        entries.push((instance.name(), instance.clone()));
    }
}

/// Answers UNSAT when the cache holds a sub-instance known to be UNSAT; otherwise
/// inconclusive so the next stage runs
pub struct SubsetCacheUnsatSolver {
    cache: Arc<dyn ContainmentCache>,
}

impl SubsetCacheUnsatSolver {
    pub fn new(cache: Arc<dyn ContainmentCache>) -> Self {
        Self { cache }
    }
}

impl Solver for SubsetCacheUnsatSolver {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        _criterion: &dyn TerminationCriterion,
        _seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();
        debug!("Querying UNSAT cache.");

        match self.cache.prove_unsat_by_subset(instance) {
            Some(key) => {
                debug!("Cached instance {} proves the problem UNSAT.", key);
                SolverResult::unsat(watch.elapsed()).with_justification(key)
            }
            None => {
                debug!("UNSAT cache unsuccessful.");
                SolverResult::timeout(watch.elapsed())
            }
        }
    }
}
