//! Keeps one solver bundle per dataset, built on first use

use super::bundle::{ManagerError, SolverBundle, SolverBundleFactory};
use crate::station::DatasetLoader;
use log::{debug, info, warn};
use std::collections::HashMap;

pub struct SolverManager {
    bundles: HashMap<String, SolverBundle>,
    loader: Box<dyn DatasetLoader>,
    factory: Box<dyn SolverBundleFactory>,
}

impl SolverManager {
    pub fn new(loader: Box<dyn DatasetLoader>, factory: Box<dyn SolverBundleFactory>) -> Self {
        Self {
            bundles: HashMap::new(),
            loader,
            factory,
        }
    }

    /// Whether a bundle for `key` is loaded
    pub fn has_data(&self, key: &str) -> bool {
        self.bundles.contains_key(key)
    }

    /// Load the dataset `key` and build its bundle. Returns `false` if it was already loaded.
    pub fn add_data(&mut self, key: &str) -> Result<bool, ManagerError> {
        debug!("Adding data from {} to solver manager.", key);
        if self.has_data(key) {
            return Ok(false);
        }

        let data = self.loader.load(key)?;
        let bundle = self.factory.bundle(data)?;
        self.bundles.insert(key.to_string(), bundle);
        info!("Loaded dataset {}.", key);
        Ok(true)
    }

    /// The bundle for `key`, loading it first if needed
    pub fn get_data(&mut self, key: &str) -> Result<&SolverBundle, ManagerError> {
        if !self.has_data(key) {
            warn!("Requested data from {} not available, will try to add it.", key);
            self.add_data(key)?;
        }
        self.bundles
            .get(key)
            .ok_or_else(|| ManagerError::Missing(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    /// Shut down and drop every bundle
    pub fn notify_shutdown(&mut self) {
        for (key, bundle) in self.bundles.drain() {
            debug!("Shutting down bundle {}.", key);
            bundle.notify_shutdown();
        }
    }
}

impl Drop for SolverManager {
    fn drop(&mut self) {
        self.notify_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::{SolverResult, Solver, TerminationCriterion};
    use crate::station::{
        ConstraintManager, DataError, DatasetBundle, Station, StationId, StationManager,
        StationPackingInstance,
    };
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl DatasetLoader for CountingLoader {
        fn load(&self, key: &str) -> Result<DatasetBundle, DataError> {
            if key == "missing" {
                return Err(DataError::NotFound(PathBuf::from(key)));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(DatasetBundle {
                stations: StationManager::new([Station::new(StationId(1), BTreeSet::from([1]))]),
                constraints: ConstraintManager::new(),
            })
        }
    }

    struct Noop {
        shutdowns: Arc<AtomicUsize>,
    }

    impl Solver for Noop {
        fn solve(
            &self,
            _instance: &StationPackingInstance,
            _criterion: &dyn TerminationCriterion,
            _seed: u64,
        ) -> SolverResult {
            SolverResult::timeout(Duration::ZERO)
        }

        fn notify_shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoopFactory {
        shutdowns: Arc<AtomicUsize>,
    }

    impl SolverBundleFactory for NoopFactory {
        fn bundle(&self, data: DatasetBundle) -> Result<SolverBundle, ManagerError> {
            Ok(SolverBundle::new(
                Arc::new(data.stations),
                Arc::new(data.constraints),
                Box::new(Noop {
                    shutdowns: self.shutdowns.clone(),
                }),
            ))
        }
    }

    fn manager() -> (SolverManager, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let manager = SolverManager::new(
            Box::new(CountingLoader {
                loads: loads.clone(),
            }),
            Box::new(NoopFactory {
                shutdowns: shutdowns.clone(),
            }),
        );
        (manager, loads, shutdowns)
    }

    #[test]
    fn test_add_data_loads_once() {
        let (mut manager, loads, _) = manager();

        assert!(!manager.has_data("a"));
        assert!(manager.add_data("a").unwrap());
        assert!(!manager.add_data("a").unwrap());
        assert!(manager.has_data("a"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_data_loads_lazily() {
        let (mut manager, loads, _) = manager();

        assert_eq!(manager.get_data("b").unwrap().stations().len(), 1);
        manager.get_data("b").unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_errors_propagate() {
        let (mut manager, _, _) = manager();

        assert!(matches!(
            manager.get_data("missing"),
            Err(ManagerError::Data(DataError::NotFound(_)))
        ));
        assert!(!manager.has_data("missing"));
    }

    #[test]
    fn test_shutdown_releases_every_bundle() {
        let (mut manager, _, shutdowns) = manager();
        manager.add_data("a").unwrap();
        manager.add_data("b").unwrap();

        manager.notify_shutdown();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
        assert_eq!(manager.keys().count(), 0);

        drop(manager);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    }
}
