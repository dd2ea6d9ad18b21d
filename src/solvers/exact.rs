//! Exact search: encode, hand the CNF to the incremental engine, decode the model

use super::result::{SatResult, SolverResult};
use super::solver::Solver;
use super::termination::TerminationCriterion;
use crate::sat::{IncrementalEngine, SatEncoder};
use crate::station::{ConstraintManager, StationPackingInstance};
use log::{debug, error};
use std::sync::Arc;
use std::time::Instant;

pub struct ExactSatSolver {
    constraints: Arc<ConstraintManager>,
    engine: IncrementalEngine,
}

impl ExactSatSolver {
    pub fn new(constraints: Arc<ConstraintManager>, engine: IncrementalEngine) -> Self {
        Self {
            constraints,
            engine,
        }
    }

    pub fn engine(&self) -> &IncrementalEngine {
        &self.engine
    }
}

impl Solver for ExactSatSolver {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();
        if criterion.has_to_stop() {
            return SolverResult::timeout(watch.elapsed());
        }
        if instance.is_empty() {
            return SolverResult::sat(Default::default(), watch.elapsed());
        }

        let cnf = SatEncoder::new(&self.constraints).encode(instance);
        if cnf.is_trivially_unsat() {
            debug!("Instance {} has a station with an empty domain.", instance.name());
            return SolverResult::unsat(watch.elapsed());
        }

        let answer = match self.engine.solve(cnf, criterion.remaining_time(), seed) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Engine failed on {}: {}", instance, e);
                return SolverResult::crashed(watch.elapsed());
            }
        };

        match answer.result {
            SatResult::Sat => match SatEncoder::decode(instance, &answer.literals) {
                Ok(assignment) if self.constraints.is_satisfying_assignment(&assignment) => {
                    SolverResult::sat(assignment, watch.elapsed())
                }
                Ok(_) => {
                    error!("Engine model for {} violates an interference constraint.", instance);
                    SolverResult::crashed(watch.elapsed())
                }
                Err(e) => {
                    error!("Could not decode engine model for {}: {}", instance, e);
                    SolverResult::crashed(watch.elapsed())
                }
            },
            other => SolverResult::new(other, watch.elapsed()),
        }
    }

    fn interrupt(&self) {
        self.engine.interrupt();
    }

    fn notify_shutdown(&self) {
        self.engine.notify_shutdown();
    }
}
