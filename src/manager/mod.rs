//! Solver bundles per dataset

pub mod bundle;
pub mod solver_manager;

pub use bundle::{
    BundleOptions, CadicalSolverBundleFactory, ManagerError, SolverBundle, SolverBundleFactory,
};
pub use solver_manager::SolverManager;
