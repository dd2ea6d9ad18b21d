//! The solver chain: presolvers, cache and exact search behind one contract

pub mod cache;
pub mod certifiers;
pub mod exact;
pub mod neighborhood;
pub mod pipeline;
pub mod result;
pub mod solver;
pub mod termination;

pub use cache::{proves_unsat, ContainmentCache, InMemoryUnsatCache, SubsetCacheUnsatSolver};
pub use certifiers::{StationSubsetCertifier, StationSubsetSatCertifier, StationSubsetUnsatCertifier};
pub use exact::ExactSatSolver;
pub use neighborhood::ConstraintGraphNeighborhoodPresolver;
pub use pipeline::{SolverPipeline, Stage};
pub use result::{SatResult, SolverResult};
pub use solver::{combine_results, Solver};
pub use termination::{
    CpuTimeTerminationCriterion, DisjunctiveCompositeTerminationCriterion,
    NeverEndingTerminationCriterion, TerminationCriterion, WalltimeTerminationCriterion,
};
