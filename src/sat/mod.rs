//! SAT encoding of station packing and the engine that solves it

pub mod constraints;
pub mod encoder;
pub mod engine;
pub mod incremental;
pub mod lookup;
pub mod solver;
pub mod variables;

pub use constraints::{Clause, Cnf, ConstraintGenerator, DimacsError};
pub use encoder::{DecodeError, EncodingStatistics, SatEncoder};
pub use engine::{
    run_incremental, EngineError, EngineFactory, EngineProblem, EngineStatus,
    IncrementalControl, SearchEngine, StopSignal,
};
pub use incremental::{DriverState, EngineResult, IncrementalEngine};
pub use lookup::{CnfLookup, LookupError};
pub use solver::CadicalEngine;
pub use variables::VariableNumbering;
