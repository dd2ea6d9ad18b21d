//! Certifiers that settle an instance by solving only a subset of its stations

use super::result::{SatResult, SolverResult};
use super::solver::Solver;
use super::termination::TerminationCriterion;
use crate::station::{Assignment, ConstraintManager, StationId, StationPackingInstance};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Tries to settle `instance` by repacking only the stations in `to_pack`
pub trait StationSubsetCertifier: Send + Sync {
    fn certify(
        &self,
        instance: &StationPackingInstance,
        to_pack: &BTreeSet<StationId>,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult;

    fn interrupt(&self) {}

    fn notify_shutdown(&self) {}
}

/// Keeps every station outside `to_pack` on its previous channel and repacks the rest.
/// A packing of the reduced problem is a packing of the whole instance.
pub struct StationSubsetSatCertifier {
    solver: Arc<dyn Solver>,
    constraints: Arc<ConstraintManager>,
}

impl StationSubsetSatCertifier {
    pub fn new(solver: Arc<dyn Solver>, constraints: Arc<ConstraintManager>) -> Self {
        Self {
            solver,
            constraints,
        }
    }

    /// The to-pack stations with every channel that clashes with a fixed station removed.
    /// `None` when some fixed station has no usable previous channel.
    fn reduced_instance(
        &self,
        instance: &StationPackingInstance,
        to_pack: &BTreeSet<StationId>,
    ) -> Option<(StationPackingInstance, BTreeMap<StationId, i32>)> {
        let previous = instance.previous_assignment();
        let mut fixed = BTreeMap::new();

        for station in instance.stations().filter(|s| !to_pack.contains(s)) {
            let channel = *previous.get(&station)?;
            if !instance.domain(station)?.contains(&channel) {
                debug!("Previous channel {} of station {} is no longer available.", channel, station);
                return None;
            }
            fixed.insert(station, channel);
        }

        let mut domains = BTreeMap::new();
        for &station in to_pack {
            let mut domain = instance.domain(station)?.clone();
            for (&other, &channel) in &fixed {
                for forbidden in self.constraints.forbidden_channels(station, other, channel) {
                    domain.remove(&forbidden);
                }
            }
            domains.insert(station, domain);
        }

        Some((StationPackingInstance::new(domains, previous.clone()), fixed))
    }
}

impl StationSubsetSatCertifier {
    fn merge(sub_assignment: &Assignment, fixed: &BTreeMap<StationId, i32>) -> Assignment {
        let mut assignment = sub_assignment.clone();
        for (&station, &channel) in fixed {
            assignment.entry(channel).or_default().insert(station);
        }
        assignment
    }
}

impl StationSubsetCertifier for StationSubsetSatCertifier {
    fn certify(
        &self,
        instance: &StationPackingInstance,
        to_pack: &BTreeSet<StationId>,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();

        let Some((reduced, fixed)) = self.reduced_instance(instance, to_pack) else {
            debug!("Not every station outside the neighborhood has a previous channel.");
            return SolverResult::timeout(watch.elapsed());
        };
        let prepared = watch.elapsed();

        debug!("Repacking {} stations around {} fixed ones.", reduced.num_stations(), fixed.len());
        let result = self.solver.solve(&reduced, criterion, seed);

        if result.result != SatResult::Sat {
            return SolverResult::timeout(result.runtime).add_time(prepared);
        }

        let assignment = Self::merge(&result.assignment, &fixed);
        if !self.constraints.is_satisfying_assignment(&assignment) {
            warn!("Previous assignment of the fixed stations is not a valid packing.");
            return SolverResult::timeout(watch.elapsed());
        }

        SolverResult::sat(assignment, result.runtime).add_time(prepared)
    }

    fn interrupt(&self) {
        self.solver.interrupt();
    }

    fn notify_shutdown(&self) {
        self.solver.notify_shutdown();
    }
}

/// Solves the to-pack stations alone with their full domains. If they cannot be packed,
/// neither can the whole instance.
pub struct StationSubsetUnsatCertifier {
    solver: Arc<dyn Solver>,
}

impl StationSubsetUnsatCertifier {
    pub fn new(solver: Arc<dyn Solver>) -> Self {
        Self { solver }
    }
}

impl StationSubsetCertifier for StationSubsetUnsatCertifier {
    fn certify(
        &self,
        instance: &StationPackingInstance,
        to_pack: &BTreeSet<StationId>,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();
        let subset = instance.restricted_to(to_pack);
        let prepared = watch.elapsed();

        let result = self.solver.solve(&subset, criterion, seed);
        if result.result == SatResult::Unsat {
            SolverResult::unsat(result.runtime).add_time(prepared)
        } else {
            SolverResult::timeout(result.runtime).add_time(prepared)
        }
    }

    fn interrupt(&self) {
        self.solver.interrupt();
    }

    fn notify_shutdown(&self) {
        self.solver.notify_shutdown();
    }
}
