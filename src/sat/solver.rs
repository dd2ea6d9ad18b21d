//! SAT engine backed by CaDiCaL

use super::constraints::Cnf;
use super::engine::{EngineError, EngineProblem, EngineStatus, SearchEngine, StopSignal};
use cadical::{Callbacks, Solver};
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Configuration name CaDiCaL is built with unless told otherwise
pub const DEFAULT_CONFIG: &str = "default";

/// Lets CaDiCaL poll the driver's stop signal
struct StopCallbacks {
    stop: StopSignal,
}

impl Callbacks for StopCallbacks {
    fn terminate(&mut self) -> bool {
        self.stop.is_raised()
    }
}

/// Search engine running every problem on a fresh CaDiCaL instance
pub struct CadicalEngine {
    config: String,
    last_statistics: Option<SolverStatistics>,
}

/// Statistics about the last solve
#[derive(Debug, Clone)]
pub struct SolverStatistics {
    pub variable_count: usize,
    pub clause_count: usize,
    pub solve_time: Duration,
    pub result: SolverResultType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResultType {
    Satisfiable,
    Unsatisfiable,
    Interrupted,
}

impl CadicalEngine {
    /// Create an engine using the CaDiCaL configuration `config`
    /// (`default`, `plain`, `sat` or `unsat`).
    pub fn new(config: &str) -> Result<Self, EngineError> {
        Solver::<StopCallbacks>::with_config(config).map_err(|_| {
            EngineError::Configuration(format!("unknown CaDiCaL configuration '{}'", config))
        })?;

        Ok(Self {
            config: config.to_string(),
            last_statistics: None,
        })
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn statistics(&self) -> Option<&SolverStatistics> {
        self.last_statistics.as_ref()
    }

    fn build_solver(&self, cnf: &Cnf, stop: &StopSignal) -> Option<Solver<StopCallbacks>> {
        let mut solver = match Solver::<StopCallbacks>::with_config(&self.config) {
            Ok(solver) => solver,
            Err(_) => {
                warn!("CaDiCaL rejected configuration '{}'.", self.config);
                return None;
            }
        };
        solver.set_callbacks(Some(StopCallbacks { stop: stop.clone() }));

        for clause in cnf.clauses() {
            solver.add_clause(clause.literals.iter().copied());
        }
        Some(solver)
    }

    /// Signed model literals for variables `1..=num_variables`
    fn extract_model(solver: &Solver<StopCallbacks>, num_variables: usize) -> Vec<i32> {
        (1..=num_variables as i32)
            .map(|var| {
                if solver.value(var).unwrap_or(false) {
                    var
                } else {
                    -var
                }
            })
            .collect()
    }
}

impl Default for CadicalEngine {
    fn default() -> Self {
        Self {
            config: DEFAULT_CONFIG.to_string(),
            last_statistics: None,
        }
    }
}

impl SearchEngine for CadicalEngine {
    fn solve(&mut self, problem: &EngineProblem, stop: &StopSignal) -> EngineStatus {
        let cnf = &problem.cnf;
        let Some(mut solver) = self.build_solver(cnf, stop) else {
            return EngineStatus::Unknown;
        };

        let start_time = Instant::now();
        let outcome = solver.solve();
        let solve_time = start_time.elapsed();

        let (status, result) = match outcome {
            Some(true) => (
                EngineStatus::Sat(Self::extract_model(&solver, cnf.num_variables())),
                SolverResultType::Satisfiable,
            ),
            Some(false) => (EngineStatus::Unsat, SolverResultType::Unsatisfiable),
            None => (EngineStatus::Unknown, SolverResultType::Interrupted),
        };

        let statistics = SolverStatistics {
            variable_count: cnf.num_variables(),
            clause_count: cnf.num_clauses(),
            solve_time,
            result,
        };
        debug!("{}", statistics);
        self.last_statistics = Some(statistics);

        status
    }
}

impl std::fmt::Display for SolverStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CaDiCaL: {} variables, {} clauses, {:?} after {:.3}s",
            self.variable_count,
            self.clause_count,
            self.result,
            self.solve_time.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::constraints::Clause;

    fn problem(cnf: Cnf) -> EngineProblem {
        EngineProblem {
            cnf,
            cutoff: Duration::from_secs(10),
            seed: 0,
        }
    }

    #[test]
    fn test_simple_satisfiable() {
        let mut engine = CadicalEngine::new(DEFAULT_CONFIG).unwrap();

        // (x1 ∨ x2) ∧ (¬x1 ∨ x2)
        let cnf = Cnf::new(2, vec![Clause::new(vec![1, 2]), Clause::new(vec![-1, 2])]);
        let status = engine.solve(&problem(cnf.clone()), &StopSignal::new());

        let EngineStatus::Sat(literals) = status else {
            panic!("expected SAT, got {:?}", status);
        };
        assert_eq!(literals.len(), 2);
        assert!(literals.contains(&2));

        let mut model = vec![false; 3];
        for lit in literals {
            model[lit.unsigned_abs() as usize] = lit > 0;
        }
        assert!(cnf.is_satisfied_by(&model));
        assert_eq!(
            engine.statistics().map(|s| s.result.clone()),
            Some(SolverResultType::Satisfiable)
        );
    }

    #[test]
    fn test_unsatisfiable() {
        let mut engine = CadicalEngine::default();
        let status = engine.solve(&problem(Cnf::trivially_unsat()), &StopSignal::new());
        assert_eq!(status, EngineStatus::Unsat);
    }

    #[test]
    fn test_engine_is_reusable() {
        let mut engine = CadicalEngine::default();
        let stop = StopSignal::new();

        assert_eq!(engine.solve(&problem(Cnf::trivially_unsat()), &stop), EngineStatus::Unsat);
        let status = engine.solve(&problem(Cnf::new(1, vec![Clause::unit(-1)])), &stop);
        assert_eq!(status, EngineStatus::Sat(vec![-1]));
    }

    #[test]
    fn test_invalid_configuration() {
        let result = CadicalEngine::new("no-such-configuration");
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
