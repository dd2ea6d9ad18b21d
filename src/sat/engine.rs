//! The narrow interface between the incremental driver and a native search engine

use super::constraints::Cnf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fatal driver and engine errors. Any of these stops the engine worker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Configuration(String),
    #[error("problem seed {requested} does not match the engine seed {configured}")]
    SeedMismatch { configured: u64, requested: u64 },
    #[error("cutoff timer did not stop within {0:?}")]
    TimerCancellation(Duration),
    #[error("engine worker has terminated")]
    WorkerTerminated,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(String),
}

/// Shared flag a running engine polls to learn it has to give up.
///
/// Raised by the cutoff timer, by `interrupt` and by shutdown. Cleared by the worker
/// before each problem.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of work for the engine
#[derive(Debug, Clone)]
pub struct EngineProblem {
    pub cnf: Cnf,
    pub cutoff: Duration,
    pub seed: u64,
}

/// What the engine itself concluded, before timeout/interrupt classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Signed literals of a model, one per variable
    Sat(Vec<i32>),
    Unsat,
    Unknown,
}

/// A SAT engine that can be asked to solve one problem at a time
pub trait SearchEngine {
    /// Solve `problem`, giving up with [`EngineStatus::Unknown`] once `stop` is raised
    fn solve(&mut self, problem: &EngineProblem, stop: &StopSignal) -> EngineStatus;
}

/// Callbacks the engine loop invokes around every problem
pub trait IncrementalControl {
    /// Block for the next problem; `None` ends the loop
    fn next_problem(&mut self) -> Option<EngineProblem>;

    /// Report the engine's answer; `false` ends the loop
    fn answer_ready(&mut self, status: EngineStatus) -> bool;

    /// The signal handed to the engine for every problem
    fn stop_signal(&self) -> StopSignal;
}

/// Builds the engine inside the worker thread
pub type EngineFactory =
    Box<dyn FnOnce() -> Result<Box<dyn SearchEngine>, EngineError> + Send + 'static>;

/// Drive `engine` until `control` stops handing out problems or refuses to continue
pub fn run_incremental<E, C>(engine: &mut E, control: &mut C)
where
    E: SearchEngine + ?Sized,
    C: IncrementalControl + ?Sized,
{
    let stop = control.stop_signal();
    while let Some(problem) = control.next_problem() {
        let status = engine.solve(&problem, &stop);
        if !control.answer_ready(status) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct EchoEngine;

    impl SearchEngine for EchoEngine {
        fn solve(&mut self, problem: &EngineProblem, _stop: &StopSignal) -> EngineStatus {
            if problem.cnf.is_trivially_unsat() {
                EngineStatus::Unsat
            } else {
                EngineStatus::Unknown
            }
        }
    }

    struct Script {
        problems: VecDeque<EngineProblem>,
        answers: Vec<EngineStatus>,
        keep_going: bool,
        stop: StopSignal,
    }

    impl IncrementalControl for Script {
        fn next_problem(&mut self) -> Option<EngineProblem> {
            self.problems.pop_front()
        }

        fn answer_ready(&mut self, status: EngineStatus) -> bool {
            self.answers.push(status);
            self.keep_going
        }

        fn stop_signal(&self) -> StopSignal {
            self.stop.clone()
        }
    }

    fn problem(cnf: Cnf) -> EngineProblem {
        EngineProblem {
            cnf,
            cutoff: Duration::from_secs(1),
            seed: 0,
        }
    }

    #[test]
    fn test_loop_runs_every_problem() {
        let mut script = Script {
            problems: VecDeque::from([problem(Cnf::trivially_unsat()), problem(Cnf::default())]),
            answers: Vec::new(),
            keep_going: true,
            stop: StopSignal::new(),
        };

        run_incremental(&mut EchoEngine, &mut script);
        assert_eq!(script.answers, vec![EngineStatus::Unsat, EngineStatus::Unknown]);
    }

    #[test]
    fn test_loop_stops_when_control_refuses() {
        let mut script = Script {
            problems: VecDeque::from([problem(Cnf::trivially_unsat()), problem(Cnf::default())]),
            answers: Vec::new(),
            keep_going: false,
            stop: StopSignal::new(),
        };

        run_incremental(&mut EchoEngine, &mut script);
        assert_eq!(script.answers.len(), 1);
        assert_eq!(script.problems.len(), 1);
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        clone.raise();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!clone.is_raised());
    }
}
