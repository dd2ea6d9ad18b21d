//! Station packing via SAT
//!
//! Decides whether a set of broadcast stations can be assigned channels without
//! interference, by encoding the question as CNF and running a chain of presolvers,
//! caches and an incremental CaDiCaL engine.

pub mod config;
pub mod extract;
pub mod facade;
pub mod logging;
pub mod manager;
pub mod sat;
pub mod solvers;
pub mod station;
pub mod utils;

pub use config::Settings;
pub use facade::{FacadeError, FacadeResult, SolveRequest, StationPackingFacade};
pub use solvers::{SatResult, SolverResult};
pub use station::{Channel, Question, StationId, StationPackingInstance};

use anyhow::{Context, Result};
use std::path::Path;

/// Main entry point for answering a single question file
pub fn solve_question_file(settings: &Settings, question: &Path) -> Result<FacadeResult> {
    let question = Question::from_file(question)
        .with_context(|| format!("Failed to read question {}", question.display()))?;

    let mut facade = StationPackingFacade::from_settings(settings);
    let result = facade
        .solve_question(&question, settings.cutoff(), settings.solver.seed)
        .context("Failed to solve question")?;
    facade.notify_shutdown();
    Ok(result)
}
