//! Per-dataset solver bundles and the factory that assembles them

use crate::sat::incremental::DEFAULT_TIMER_GRACE;
use crate::sat::{CadicalEngine, EngineError, EngineFactory, IncrementalEngine, SearchEngine};
use crate::solvers::{
    ConstraintGraphNeighborhoodPresolver, ContainmentCache, ExactSatSolver, InMemoryUnsatCache,
    Solver, SolverPipeline, Stage, StationSubsetCertifier, StationSubsetSatCertifier, StationSubsetUnsatCertifier,
    SubsetCacheUnsatSolver,
};
use crate::station::{ConstraintManager, DataError, DatasetBundle, StationManager};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("no bundle for dataset '{0}'")]
    Missing(String),
}

/// The station data of one dataset together with a solver built for it
pub struct SolverBundle {
    stations: Arc<StationManager>,
    constraints: Arc<ConstraintManager>,
    solver: Box<dyn Solver>,
}

impl SolverBundle {
    pub fn new(
        stations: Arc<StationManager>,
        constraints: Arc<ConstraintManager>,
        solver: Box<dyn Solver>,
    ) -> Self {
        Self {
            stations,
            constraints,
            solver,
        }
    }

    pub fn stations(&self) -> &StationManager {
        &self.stations
    }

    pub fn constraints(&self) -> &ConstraintManager {
        &self.constraints
    }

    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    pub fn notify_shutdown(&self) {
        self.solver.notify_shutdown();
    }
}

/// Builds the solver bundle for freshly loaded dataset data
pub trait SolverBundleFactory: Send + Sync {
    fn bundle(&self, data: DatasetBundle) -> Result<SolverBundle, ManagerError>;
}

/// How [`CadicalSolverBundleFactory`] assembles its pipeline
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub engine_config: String,
    pub seed: u64,
    pub timer_grace: Duration,
    pub presolve: bool,
    pub max_missing_stations: usize,
    pub max_to_pack: usize,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            engine_config: crate::sat::solver::DEFAULT_CONFIG.to_string(),
            seed: 0,
            timer_grace: DEFAULT_TIMER_GRACE,
            presolve: true,
            max_missing_stations: crate::solvers::neighborhood::DEFAULT_MAX_MISSING_STATIONS,
            max_to_pack: crate::solvers::neighborhood::DEFAULT_MAX_TO_PACK,
        }
    }
}

enum UnsatCache {
    Disabled,
    Shared(Arc<dyn ContainmentCache>),
    PerDataset,
}

/// Builds `[neighborhood presolver] -> [UNSAT cache] -> exact CaDiCaL search` pipelines.
///
/// Every bundle gets its own engine worker. The neighborhood certifiers share that
/// worker with the exact stage.
pub struct CadicalSolverBundleFactory {
    options: BundleOptions,
    cache: UnsatCache,
    learn_unsat: bool,
}

impl CadicalSolverBundleFactory {
    pub fn new(options: BundleOptions) -> Self {
        Self {
            options,
            cache: UnsatCache::Disabled,
            learn_unsat: false,
        }
    }

    /// Use `cache` in every bundle. Only sound when all bundles share interference data.
    pub fn with_cache(mut self, cache: Arc<dyn ContainmentCache>, learn_unsat: bool) -> Self {
        self.cache = UnsatCache::Shared(cache);
        self.learn_unsat = learn_unsat;
        self
    }

    /// Give each bundle its own in-memory UNSAT cache
    pub fn with_dataset_caches(mut self, learn_unsat: bool) -> Self {
        self.cache = UnsatCache::PerDataset;
        self.learn_unsat = learn_unsat;
        self
    }

    fn spawn_engine(&self) -> Result<IncrementalEngine, EngineError> {
        let config = self.options.engine_config.clone();
        let factory: EngineFactory = Box::new(move || {
            CadicalEngine::new(&config).map(|engine| Box::new(engine) as Box<dyn SearchEngine>)
        });
        IncrementalEngine::spawn_with_grace(factory, self.options.seed, self.options.timer_grace)
    }

    /// `[neighborhood presolver] -> [UNSAT cache] -> exact`, each optional stage present
    /// only when enabled
    fn pipeline(&self, constraints: &Arc<ConstraintManager>, exact: Arc<dyn Solver>) -> SolverPipeline {
        let mut pipeline = SolverPipeline::new();
        if self.options.presolve {
            let certifiers: Vec<Box<dyn StationSubsetCertifier>> = vec![
                Box::new(StationSubsetUnsatCertifier::new(exact.clone())),
                Box::new(StationSubsetSatCertifier::new(exact.clone(), constraints.clone())),
            ];
            let presolver = ConstraintGraphNeighborhoodPresolver::new(constraints.clone(), certifiers)
                .with_bounds(self.options.max_missing_stations, self.options.max_to_pack);
            pipeline = pipeline.then(Stage::new("neighborhood", presolver));
        }

        let cache: Option<Arc<dyn ContainmentCache>> = match &self.cache {
            UnsatCache::Disabled => None,
            UnsatCache::Shared(cache) => Some(cache.clone()),
            UnsatCache::PerDataset => Some(Arc::new(InMemoryUnsatCache::new())),
        };
        if let Some(cache) = cache {
            pipeline = pipeline.then(Stage::new("unsat-cache", SubsetCacheUnsatSolver::new(cache.clone())));
            if self.learn_unsat {
                pipeline = pipeline.learning_unsat_into(cache);
            }
        }

        pipeline.then(Stage::new("exact", exact))
    }
}

impl SolverBundleFactory for CadicalSolverBundleFactory {
    fn bundle(&self, data: DatasetBundle) -> Result<SolverBundle, ManagerError> {
        let stations = Arc::new(data.stations);
        let constraints = Arc::new(data.constraints);

        let engine = self.spawn_engine()?;
        let exact: Arc<dyn Solver> = Arc::new(ExactSatSolver::new(constraints.clone(), engine));

        let pipeline = self.pipeline(&constraints, exact);
        info!(
            "Built solver bundle for {} stations: {}.",
            stations.len(),
            pipeline.stage_names().join(" -> ")
        );
        Ok(SolverBundle::new(stations, constraints, Box::new(pipeline)))
    }
}
