//! Presolver that repacks only the interference neighborhood of new stations

use super::certifiers::StationSubsetCertifier;
use super::result::SolverResult;
use super::solver::{combine_results, Solver};
use super::termination::TerminationCriterion;
use crate::station::{ConstraintManager, StationId, StationPackingInstance};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_MAX_MISSING_STATIONS: usize = 20;
pub const DEFAULT_MAX_TO_PACK: usize = 100;

/// Runs its certifiers on the stations missing from the previous assignment plus
/// their neighbors in the interference graph.
///
/// Abstains with TIMEOUT when there is no previous assignment, when too many stations
/// are missing from it, or when the neighborhood grows too large.
pub struct ConstraintGraphNeighborhoodPresolver {
    constraints: Arc<ConstraintManager>,
    certifiers: Vec<Box<dyn StationSubsetCertifier>>,
    max_missing_stations: usize,
    max_to_pack: usize,
}

impl ConstraintGraphNeighborhoodPresolver {
    pub fn new(
        constraints: Arc<ConstraintManager>,
        certifiers: Vec<Box<dyn StationSubsetCertifier>>,
    ) -> Self {
        Self {
            constraints,
            certifiers,
            max_missing_stations: DEFAULT_MAX_MISSING_STATIONS,
            max_to_pack: DEFAULT_MAX_TO_PACK,
        }
    }

    pub fn with_bounds(mut self, max_missing_stations: usize, max_to_pack: usize) -> Self {
        self.max_missing_stations = max_missing_stations;
        self.max_to_pack = max_to_pack;
        self
    }

    /// Missing stations and their interference neighbors
    pub fn neighborhood(
        &self,
        instance: &StationPackingInstance,
        missing: &BTreeSet<StationId>,
    ) -> BTreeSet<StationId> {
        let graph = self.constraints.interference_graph(instance);
        let mut to_pack = missing.clone();
        for station in missing {
            if let Some(neighbors) = graph.get(station) {
                to_pack.extend(neighbors.iter().copied());
            }
        }
        to_pack
    }
}

impl Solver for ConstraintGraphNeighborhoodPresolver {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();

        let previous = instance.previous_assignment();
        if previous.is_empty() {
            debug!("No previous assignment to presolve from.");
            return SolverResult::timeout(watch.elapsed());
        }

        let missing: BTreeSet<StationId> = instance
            .stations()
            .filter(|station| !previous.contains_key(station))
            .collect();
        if missing.len() < 10 {
            debug!("Stations {:?} are not part of the previous assignment.", missing);
        } else {
            debug!("{} stations are not part of the previous assignment.", missing.len());
        }
        if missing.len() > self.max_missing_stations {
            debug!("Too many missing stations ({}).", missing.len());
            return SolverResult::timeout(watch.elapsed());
        }

        let to_pack = self.neighborhood(instance, &missing);
        if to_pack.len() > self.max_to_pack {
            debug!("Neighborhood to pack is too large ({}).", to_pack.len());
            return SolverResult::timeout(watch.elapsed());
        }

        let mut results = Vec::new();
        let mut certifying = std::time::Duration::ZERO;
        for (index, certifier) in self.certifiers.iter().enumerate() {
            if criterion.has_to_stop() {
                break;
            }
            debug!("Trying neighborhood certifier {}.", index + 1);

            let started = Instant::now();
            let result = certifier.certify(instance, &to_pack, criterion, seed);
            certifying += started.elapsed();

            let conclusive = result.is_conclusive();
            results.push(result);
            if conclusive {
                break;
            }
        }

        let overhead = watch.elapsed().saturating_sub(certifying);
        let combined = combine_results(&results).add_time(overhead);
        debug!("Neighborhood presolver: {}", combined);
        combined
    }

    fn interrupt(&self) {
        for certifier in &self.certifiers {
            certifier.interrupt();
        }
    }

    fn notify_shutdown(&self) {
        for certifier in &self.certifiers {
            certifier.notify_shutdown();
        }
    }
}
