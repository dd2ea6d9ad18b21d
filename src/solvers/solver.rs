//! The contract every strategy of the solver chain fulfils

use super::result::{SatResult, SolverResult};
use super::termination::TerminationCriterion;
use crate::station::StationPackingInstance;
use std::sync::Arc;
use std::time::Duration;

/// A station packing strategy.
///
/// `solve` must return once `criterion` says to stop, reporting TIMEOUT if nothing
/// was settled. `interrupt` asks an in-flight `solve` to return early and
/// `notify_shutdown` releases any resources; both may be called from other threads.
pub trait Solver: Send + Sync {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult;

    fn interrupt(&self) {}

    fn notify_shutdown(&self) {}
}

impl<S: Solver + ?Sized> Solver for Arc<S> {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        (**self).solve(instance, criterion, seed)
    }

    fn interrupt(&self) {
        (**self).interrupt()
    }

    fn notify_shutdown(&self) {
        (**self).notify_shutdown()
    }
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        criterion: &dyn TerminationCriterion,
        seed: u64,
    ) -> SolverResult {
        (**self).solve(instance, criterion, seed)
    }

    fn interrupt(&self) {
        (**self).interrupt()
    }

    fn notify_shutdown(&self) {
        (**self).notify_shutdown()
    }
}

/// Merge the results of consecutive attempts: the last conclusive result wins, or
/// TIMEOUT when none settled the instance. Runtimes are summed either way.
pub fn combine_results(results: &[SolverResult]) -> SolverResult {
    let runtime: Duration = results.iter().map(|r| r.runtime).sum();

    match results.iter().rev().find(|r| r.is_conclusive()) {
        Some(conclusive) => SolverResult {
            runtime,
            ..conclusive.clone()
        },
        None => SolverResult::new(SatResult::Timeout, runtime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_takes_last_conclusive() {
        let results = [
            SolverResult::timeout(Duration::from_millis(100)),
            SolverResult::unsat(Duration::from_millis(200)).with_justification("cache"),
            SolverResult::crashed(Duration::from_millis(300)),
        ];

        let combined = combine_results(&results);
        assert_eq!(combined.result, SatResult::Unsat);
        assert_eq!(combined.justification.as_deref(), Some("cache"));
        assert_eq!(combined.runtime, Duration::from_millis(600));
    }

    #[test]
    fn test_combine_without_conclusive_result() {
        let results = [
            SolverResult::crashed(Duration::from_millis(10)),
            SolverResult::timeout(Duration::from_millis(10)),
        ];
        let combined = combine_results(&results);
        assert_eq!(combined.result, SatResult::Timeout);
        assert_eq!(combined.runtime, Duration::from_millis(20));

        assert_eq!(combine_results(&[]).result, SatResult::Timeout);
    }
}
