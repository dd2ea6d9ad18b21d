//! An ordered chain of solvers tried cheapest first

use super::cache::ContainmentCache;
use super::result::{SatResult, SolverResult};
use super::solver::Solver;
use super::termination::TerminationCriterion;
use crate::station::StationPackingInstance;
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

/// A named stage of the pipeline
pub struct Stage {
    name: String,
    solver: Box<dyn Solver>,
}

impl Stage {
    pub fn new<S: Solver + 'static>(name: &str, solver: S) -> Self {
        Self {
            name: name.to_string(),
            solver: Box::new(solver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs its stages in order until one settles the instance.
///
/// Inconclusive stages fall through to the next one, and the time of every stage that
/// ran is charged to the final result. Reports TIMEOUT once the criterion fires between
/// stages or when no stage settles the instance.
pub struct SolverPipeline {
    stages: Vec<Stage>,
    learner: Option<Arc<dyn ContainmentCache>>,
}

impl SolverPipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            learner: None,
        }
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Record every UNSAT found by search in `cache`
    pub fn learning_unsat_into(mut self, cache: Arc<dyn ContainmentCache>) -> Self {
        self.learner = Some(cache);
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    fn learn(&self, instance: &StationPackingInstance, result: &SolverResult) {
        let Some(cache) = &self.learner else {
            return;
        };
        if result.result == SatResult::Unsat && result.justification.is_none() {
            debug!("Adding {} to the UNSAT cache.", instance.name());
            cache.insert_unsat(instance);
        }
    }
}

impl Default for SolverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverPipeline {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        let watch = Instant::now();
        let mut spent = std::time::Duration::ZERO;

        for stage in &self.stages {
            if criterion.has_to_stop() {
                debug!("Out of time before stage {}.", stage.name);
                break;
            }

            let result = stage.solver.solve(instance, criterion, seed);
            spent += result.runtime;
            debug!("Stage {}: {}", stage.name, result);

            if result.is_conclusive() {
                info!("{} solved by {}: {}", instance.name(), stage.name, result.result);
                self.learn(instance, &result);
                let overhead = watch.elapsed().saturating_sub(spent);
                return SolverResult {
                    runtime: spent,
                    ..result
                }
                .add_time(overhead);
            }
        }

        SolverResult::timeout(spent.max(watch.elapsed()))
    }

    fn interrupt(&self) {
        for stage in &self.stages {
            stage.solver.interrupt();
        }
    }

    fn notify_shutdown(&self) {
        for stage in &self.stages {
            stage.solver.notify_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::cache::{InMemoryUnsatCache, SubsetCacheUnsatSolver};
    use crate::solvers::termination::{
        NeverEndingTerminationCriterion, WalltimeTerminationCriterion,
    };
    use crate::station::StationId;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixed {
        result: SatResult,
        calls: Arc<AtomicUsize>,
        interrupts: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(result: SatResult) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let stage = Self {
                result,
                calls: calls.clone(),
                interrupts: Arc::new(AtomicUsize::new(0)),
            };
            (stage, calls)
        }
    }

    impl Solver for Fixed {
        fn solve(
            &self,
            _instance: &StationPackingInstance,
            _criterion: &dyn TerminationCriterion,
            _seed: u64,
        ) -> SolverResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SolverResult::new(self.result, Duration::from_millis(10))
        }

        fn interrupt(&self) {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn instance() -> StationPackingInstance {
        StationPackingInstance::with_domains(BTreeMap::from([(StationId(1), BTreeSet::from([1]))]))
    }

    #[test]
    fn test_falls_through_to_first_conclusive_stage() {
        let (timeout, timeout_calls) = Fixed::new(SatResult::Timeout);
        let (crashed, crashed_calls) = Fixed::new(SatResult::Crashed);
        let (unsat, unsat_calls) = Fixed::new(SatResult::Unsat);
        let (sat, sat_calls) = Fixed::new(SatResult::Sat);

        let pipeline = SolverPipeline::new()
            .then(Stage::new("timeout", timeout))
            .then(Stage::new("crashed", crashed))
            .then(Stage::new("unsat", unsat))
            .then(Stage::new("sat", sat));

        let result = pipeline.solve(&instance(), &NeverEndingTerminationCriterion, 0);
        assert_eq!(result.result, SatResult::Unsat);
        assert!(result.runtime >= Duration::from_millis(30));

        assert_eq!(timeout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(crashed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unsat_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sat_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_conclusive_stage_is_timeout() {
        let (a, _) = Fixed::new(SatResult::Timeout);
        let (b, _) = Fixed::new(SatResult::Crashed);
        let pipeline = SolverPipeline::new()
            .then(Stage::new("a", a))
            .then(Stage::new("b", b));

        let result = pipeline.solve(&instance(), &NeverEndingTerminationCriterion, 0);
        assert_eq!(result.result, SatResult::Timeout);
        assert!(result.runtime >= Duration::from_millis(20));
    }

    #[test]
    fn test_expired_criterion_skips_stages() {
        let (sat, calls) = Fixed::new(SatResult::Sat);
        let pipeline = SolverPipeline::new().then(Stage::new("sat", sat));
        let expired = WalltimeTerminationCriterion::starting_now(Duration::ZERO);

        assert_eq!(pipeline.solve(&instance(), &expired, 0).result, SatResult::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_learned_unsat_short_circuits_next_time() {
        let cache = Arc::new(InMemoryUnsatCache::new());
        let (unsat, calls) = Fixed::new(SatResult::Unsat);
        let pipeline = SolverPipeline::new()
            .then(Stage::new("cache", SubsetCacheUnsatSolver::new(cache.clone())))
            .then(Stage::new("search", unsat))
            .learning_unsat_into(cache.clone());

        let first = pipeline.solve(&instance(), &NeverEndingTerminationCriterion, 0);
        assert_eq!(first.result, SatResult::Unsat);
        assert_eq!(cache.len(), 1);

        let second = pipeline.solve(&instance(), &NeverEndingTerminationCriterion, 0);
        assert_eq!(second.result, SatResult::Unsat);
        assert_eq!(second.justification, Some(instance().name()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupt_reaches_every_stage() {
        let (a, _) = Fixed::new(SatResult::Timeout);
        let interrupts = a.interrupts.clone();
        let pipeline = SolverPipeline::new().then(Stage::new("a", a));

        pipeline.interrupt();
        assert_eq!(interrupts.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.stage_names(), vec!["a"]);
    }
}
