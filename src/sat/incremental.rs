//! Incremental engine driver.
//!
//! A single worker thread owns the search engine and runs [`run_incremental`]. Problems
//! reach it over an input queue and answers come back over an output queue, so the
//! handle can be shared between threads while the engine never leaves its worker.
//! Each problem gets its own cutoff timer thread that raises the engine's stop signal
//! when the budget runs out.

use super::constraints::Cnf;
use super::engine::{
    run_incremental, EngineError, EngineFactory, EngineProblem, EngineStatus,
    IncrementalControl, StopSignal,
};
use crate::solvers::SatResult;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long answer processing waits for the cutoff timer to acknowledge cancellation
pub const DEFAULT_TIMER_GRACE: Duration = Duration::from_secs(3);

/// Lifecycle of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverState {
    Idle = 0,
    AwaitingProblem = 1,
    Solving = 2,
    ProcessingAnswer = 3,
    ShuttingDown = 4,
}

impl DriverState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DriverState::AwaitingProblem,
            2 => DriverState::Solving,
            3 => DriverState::ProcessingAnswer,
            4 => DriverState::ShuttingDown,
            _ => DriverState::Idle,
        }
    }
}

/// Classified answer for one problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub result: SatResult,
    /// Model literals, only for SAT
    pub literals: Vec<i32>,
    pub runtime: Duration,
}

type Answer = Result<EngineResult, EngineError>;

/// Flags shared between the handle, the worker and the cutoff timer.
///
/// `interrupted` is written by the handle, `timed_out` by the timer, `solving` by the
/// worker and `terminated` by both the handle and the worker. All of them are read by
/// the worker when classifying an answer.
///
/// `gate` is held by the worker while it starts or finishes a problem and by
/// [`DriverShared::interrupt`], so an interrupt always lands on the problem it saw.
#[derive(Debug, Default)]
struct DriverShared {
    state: AtomicU8,
    interrupted: AtomicBool,
    timed_out: AtomicBool,
    solving: AtomicBool,
    terminated: AtomicBool,
    stop: StopSignal,
    gate: Mutex<()>,
}

impl DriverShared {
    fn set_state(&self, state: DriverState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition<T>(&self, f: impl FnOnce() -> T) -> T {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Raise the stop signal if a problem is in flight. Returns whether one was.
    fn interrupt(&self) -> bool {
        self.transition(|| {
            if !self.solving.load(Ordering::SeqCst) {
                return false;
            }
            self.interrupted.store(true, Ordering::SeqCst);
            self.stop.raise();
            true
        })
    }
}

/// Raises the stop signal once the cutoff elapses unless cancelled first
struct CutoffTimer {
    cancel: Sender<()>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

impl CutoffTimer {
    fn arm(cutoff: Duration, shared: Arc<DriverShared>) -> Result<Self, EngineError> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let (finished, done) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("engine-cutoff".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(cutoff) {
                    debug!("Cutoff of {:.3}s reached.", cutoff.as_secs_f64());
                    shared.timed_out.store(true, Ordering::SeqCst);
                    shared.stop.raise();
                }
                let _ = finished.send(());
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        Ok(Self {
            cancel,
            done,
            handle,
        })
    }

    /// Cancel and wait at most `grace` for the timer thread to wind down
    fn cancel(self, grace: Duration) -> Result<(), EngineError> {
        let _ = self.cancel.send(());
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(EngineError::TimerCancellation(grace)),
        }
    }
}

/// Worker-side end of the queues
struct WorkerControl {
    shared: Arc<DriverShared>,
    problems: Receiver<EngineProblem>,
    answers: Sender<Answer>,
    seed: u64,
    grace: Duration,
    timer: Option<CutoffTimer>,
    started: Option<Instant>,
}

impl WorkerControl {
    fn fail(&mut self, error: EngineError) {
        error!("Engine worker stopping: {}", error);
        self.shared.terminated.store(true, Ordering::SeqCst);
        let _ = self.answers.send(Err(error));
    }

    fn shutdown(&mut self) {
        self.shared.set_state(DriverState::ShuttingDown);
        self.shared
            .transition(|| self.shared.solving.store(false, Ordering::SeqCst));
        if let Some(timer) = self.timer.take() {
            if let Err(e) = timer.cancel(self.grace) {
                warn!("{}", e);
            }
        }
        debug!("Engine worker shut down.");
    }
}

impl IncrementalControl for WorkerControl {
    fn next_problem(&mut self) -> Option<EngineProblem> {
        self.shared.set_state(DriverState::AwaitingProblem);

        let Ok(problem) = self.problems.recv() else {
            debug!("Problem queue closed.");
            return None;
        };
        if self.shared.terminated.load(Ordering::SeqCst) {
            return None;
        }
        if problem.seed != self.seed {
            self.fail(EngineError::SeedMismatch {
                configured: self.seed,
                requested: problem.seed,
            });
            return None;
        }

        let accepted = self.shared.transition(|| {
            self.shared.interrupted.store(false, Ordering::SeqCst);
            self.shared.timed_out.store(false, Ordering::SeqCst);
            self.shared.stop.clear();
            if self.shared.terminated.load(Ordering::SeqCst) {
                return false;
            }
            self.shared.solving.store(true, Ordering::SeqCst);
            true
        });
        if !accepted {
            return None;
        }

        self.shared.set_state(DriverState::Solving);
        self.started = Some(Instant::now());

        match CutoffTimer::arm(problem.cutoff, Arc::clone(&self.shared)) {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => {
                self.fail(e);
                return None;
            }
        }

        debug!(
            "Solving {} variables, {} clauses with a {:.3}s cutoff.",
            problem.cnf.num_variables(),
            problem.cnf.num_clauses(),
            problem.cutoff.as_secs_f64()
        );
        Some(problem)
    }

    fn answer_ready(&mut self, status: EngineStatus) -> bool {
        self.shared
            .transition(|| self.shared.solving.store(false, Ordering::SeqCst));
        self.shared.set_state(DriverState::ProcessingAnswer);

        if let Some(timer) = self.timer.take() {
            if let Err(e) = timer.cancel(self.grace) {
                self.fail(e);
                return false;
            }
        }
        let runtime = self.started.take().map(|s| s.elapsed()).unwrap_or_default();

        let (result, literals) = if self.shared.timed_out.load(Ordering::SeqCst) {
            (SatResult::Timeout, Vec::new())
        } else if self.shared.interrupted.load(Ordering::SeqCst) {
            debug!("Solve was interrupted.");
            (SatResult::Timeout, Vec::new())
        } else {
            match status {
                EngineStatus::Sat(literals) => (SatResult::Sat, literals),
                EngineStatus::Unsat => (SatResult::Unsat, Vec::new()),
                EngineStatus::Unknown => {
                    warn!("Engine gave up without a timeout or interrupt.");
                    (SatResult::Crashed, Vec::new())
                }
            }
        };

        let answer = EngineResult {
            result,
            literals,
            runtime,
        };
        if self.answers.send(Ok(answer)).is_err() {
            self.shared.terminated.store(true, Ordering::SeqCst);
        }

        !self.shared.terminated.load(Ordering::SeqCst)
    }

    fn stop_signal(&self) -> StopSignal {
        self.shared.stop.clone()
    }
}

/// Handle to a search engine running on its own worker thread
pub struct IncrementalEngine {
    problems: Mutex<Option<Sender<EngineProblem>>>,
    answers: Mutex<Receiver<Answer>>,
    shared: Arc<DriverShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    seed: u64,
}

impl IncrementalEngine {
    /// Start a worker that builds its engine with `factory` and accepts problems
    /// carrying `seed`. Fails if the engine cannot be built.
    pub fn spawn(factory: EngineFactory, seed: u64) -> Result<Self, EngineError> {
        Self::spawn_with_grace(factory, seed, DEFAULT_TIMER_GRACE)
    }

    pub fn spawn_with_grace(
        factory: EngineFactory,
        seed: u64,
        grace: Duration,
    ) -> Result<Self, EngineError> {
        let (problem_tx, problem_rx) = mpsc::channel();
        let (answer_tx, answer_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let shared = Arc::new(DriverShared::default());

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("engine-worker".to_string())
            .spawn(move || {
                let mut engine = match factory() {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut control = WorkerControl {
                    shared: worker_shared,
                    problems: problem_rx,
                    answers: answer_tx,
                    seed,
                    grace,
                    timer: None,
                    started: None,
                };
                run_incremental(engine.as_mut(), &mut control);
                control.shutdown();
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let ready = ready_rx.recv().unwrap_or(Err(EngineError::WorkerTerminated));
        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        info!("Engine worker started with seed {}.", seed);
        Ok(Self {
            problems: Mutex::new(Some(problem_tx)),
            answers: Mutex::new(answer_rx),
            shared,
            worker: Mutex::new(Some(handle)),
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Submit `cnf` and block for its classified answer. Concurrent callers are
    /// served one at a time.
    pub fn solve(&self, cnf: Cnf, cutoff: Duration, seed: u64) -> Result<EngineResult, EngineError> {
        let answers = self.answers.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_terminated() {
            return Err(EngineError::WorkerTerminated);
        }

        {
            let problems = self.problems.lock().unwrap_or_else(PoisonError::into_inner);
            let sender = problems.as_ref().ok_or(EngineError::WorkerTerminated)?;
            sender
                .send(EngineProblem { cnf, cutoff, seed })
                .map_err(|_| EngineError::WorkerTerminated)?;
        }

        answers.recv().map_err(|_| EngineError::WorkerTerminated)?
    }

    /// Stop the problem currently being solved. It is answered as TIMEOUT.
    pub fn interrupt(&self) {
        if self.shared.interrupt() {
            info!("Interrupted engine.");
        } else {
            debug!("Engine is not solving, nothing to interrupt.");
        }
    }

    /// Close the problem queue and join the worker. Safe to call more than once.
    pub fn notify_shutdown(&self) {
        let sender = self
            .problems
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() && handle.is_none() {
            return;
        }

        info!("Shutting down engine worker.");
        self.interrupt();
        self.shared.terminated.store(true, Ordering::SeqCst);
        self.shared.stop.raise();
        drop(sender);

        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Engine worker panicked.");
            }
        }
    }
}

impl Drop for IncrementalEngine {
    fn drop(&mut self) {
        self.notify_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::constraints::Clause;
    use crate::sat::engine::SearchEngine;
    use crate::sat::solver::CadicalEngine;

    /// Answers trivial UNSAT formulas at once and spins on anything else until stopped
    struct SpinEngine;

    impl SearchEngine for SpinEngine {
        fn solve(&mut self, problem: &EngineProblem, stop: &StopSignal) -> EngineStatus {
            if problem.cnf.is_trivially_unsat() {
                return EngineStatus::Unsat;
            }
            if problem.cnf.num_clauses() == 0 {
                return EngineStatus::Unknown;
            }
            while !stop.is_raised() {
                thread::sleep(Duration::from_millis(1));
            }
            EngineStatus::Unknown
        }
    }

    fn spin_factory() -> EngineFactory {
        Box::new(|| Ok(Box::new(SpinEngine) as Box<dyn SearchEngine>))
    }

    fn hard_cnf() -> Cnf {
        Cnf::new(1, vec![Clause::unit(1)])
    }

    #[test]
    fn test_timeout_then_usable() {
        let engine = IncrementalEngine::spawn(spin_factory(), 7).unwrap();

        let answer = engine.solve(hard_cnf(), Duration::from_millis(100), 7).unwrap();
        assert_eq!(answer.result, SatResult::Timeout);
        assert!(answer.runtime >= Duration::from_millis(100));

        let answer = engine.solve(Cnf::trivially_unsat(), Duration::from_secs(5), 7).unwrap();
        assert_eq!(answer.result, SatResult::Unsat);

        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.state() != DriverState::AwaitingProblem && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(engine.state(), DriverState::AwaitingProblem);
    }

    #[test]
    fn test_interrupt_reports_timeout() {
        let engine = Arc::new(IncrementalEngine::spawn(spin_factory(), 0).unwrap());

        let solving = Arc::clone(&engine);
        let handle = thread::spawn(move || solving.solve(hard_cnf(), Duration::from_secs(60), 0));

        while engine.state() != DriverState::Solving {
            thread::sleep(Duration::from_millis(1));
        }
        engine.interrupt();

        let answer = handle.join().unwrap().unwrap();
        assert_eq!(answer.result, SatResult::Timeout);
        assert!(answer.runtime < Duration::from_secs(60));
    }

    #[test]
    fn test_interrupt_when_idle_is_ignored() {
        let engine = IncrementalEngine::spawn(spin_factory(), 0).unwrap();
        engine.interrupt();

        let answer = engine.solve(Cnf::trivially_unsat(), Duration::from_secs(5), 0).unwrap();
        assert_eq!(answer.result, SatResult::Unsat);
    }

    #[test]
    fn test_unknown_is_crashed() {
        let engine = IncrementalEngine::spawn(spin_factory(), 0).unwrap();
        let answer = engine.solve(Cnf::default(), Duration::from_secs(5), 0).unwrap();
        assert_eq!(answer.result, SatResult::Crashed);
    }

    #[test]
    fn test_seed_mismatch_is_fatal() {
        let engine = IncrementalEngine::spawn(spin_factory(), 1).unwrap();

        let error = engine.solve(Cnf::trivially_unsat(), Duration::from_secs(5), 2);
        assert_eq!(
            error,
            Err(EngineError::SeedMismatch {
                configured: 1,
                requested: 2
            })
        );
        assert_eq!(
            engine.solve(Cnf::trivially_unsat(), Duration::from_secs(5), 1),
            Err(EngineError::WorkerTerminated)
        );
    }

    #[test]
    fn test_factory_failure() {
        let factory: EngineFactory =
            Box::new(|| Err(EngineError::Configuration("bad".to_string())));
        let result = IncrementalEngine::spawn(factory, 0);
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = IncrementalEngine::spawn(spin_factory(), 0).unwrap();
        engine.notify_shutdown();
        engine.notify_shutdown();

        assert!(engine.is_terminated());
        assert_eq!(
            engine.solve(Cnf::trivially_unsat(), Duration::from_secs(1), 0),
            Err(EngineError::WorkerTerminated)
        );
    }

    #[test]
    fn test_interrupt_rechecks_under_gate() {
        let shared = Arc::new(DriverShared::default());
        shared.solving.store(true, Ordering::SeqCst);

        let gate = shared.gate.lock().unwrap();
        let interrupter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.interrupt())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!shared.stop.is_raised());

        // the answer lands before the interrupt gets through
        shared.solving.store(false, Ordering::SeqCst);
        drop(gate);

        assert!(!interrupter.join().unwrap());
        assert!(!shared.stop.is_raised());
        assert!(!shared.interrupted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timer_cancel() {
        let shared = Arc::new(DriverShared::default());
        let timer = CutoffTimer::arm(Duration::from_secs(60), Arc::clone(&shared)).unwrap();
        assert_eq!(timer.cancel(Duration::from_secs(5)), Ok(()));
        assert!(!shared.timed_out.load(Ordering::SeqCst));
        assert!(!shared.stop.is_raised());

        let timer = CutoffTimer::arm(Duration::from_millis(10), Arc::clone(&shared)).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(timer.cancel(Duration::from_secs(5)), Ok(()));
        assert!(shared.timed_out.load(Ordering::SeqCst));
        assert!(shared.stop.is_raised());
    }

    /// A timer whose thread never reports back
    fn stuck_timer() -> (CutoffTimer, Sender<()>) {
        let (cancel, _cancelled) = mpsc::channel();
        let (finished, done) = mpsc::channel();
        let timer = CutoffTimer {
            cancel,
            done,
            handle: thread::spawn(|| {}),
        };
        (timer, finished)
    }

    #[test]
    fn test_stuck_timer_fails_the_worker() {
        let (timer, _finished) = stuck_timer();
        assert_eq!(
            timer.cancel(Duration::ZERO),
            Err(EngineError::TimerCancellation(Duration::ZERO))
        );

        let shared = Arc::new(DriverShared::default());
        let (_problem_tx, problems) = mpsc::channel();
        let (answers, answer_rx) = mpsc::channel();
        let (timer, _finished) = stuck_timer();
        let mut control = WorkerControl {
            shared: Arc::clone(&shared),
            problems,
            answers,
            seed: 0,
            grace: Duration::ZERO,
            timer: Some(timer),
            started: Some(Instant::now()),
        };

        assert!(!control.answer_ready(EngineStatus::Unsat));
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert_eq!(
            answer_rx.recv().unwrap(),
            Err(EngineError::TimerCancellation(Duration::ZERO))
        );
    }

    #[test]
    fn test_cadical_worker() {
        let factory: EngineFactory = Box::new(|| {
            CadicalEngine::new("default").map(|e| Box::new(e) as Box<dyn SearchEngine>)
        });
        let engine = IncrementalEngine::spawn(factory, 0).unwrap();

        let cnf = Cnf::new(2, vec![Clause::binary(1, 2), Clause::unit(-1)]);
        let answer = engine.solve(cnf, Duration::from_secs(10), 0).unwrap();
        assert_eq!(answer.result, SatResult::Sat);
        assert_eq!(answer.literals, vec![-1, 2]);
    }
}
