//! Entry point for solving station packing questions against loaded datasets

use crate::config::Settings;
use crate::manager::{CadicalSolverBundleFactory, ManagerError, SolverManager};
use crate::solvers::{
    CpuTimeTerminationCriterion, DisjunctiveCompositeTerminationCriterion, SatResult,
    TerminationCriterion, WalltimeTerminationCriterion,
};
use crate::station::{
    station_channels, Channel, DataError, DatasetLoader, FileDatasetLoader, Question, StationId,
    StationPackingInstance,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("cutoff must be strictly positive, got {0:?}")]
    InvalidCutoff(Duration),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// A packing question in raw form
#[derive(Debug, Clone, Default)]
pub struct SolveRequest {
    pub stations: BTreeSet<StationId>,
    pub channels: BTreeSet<Channel>,
    /// Optional per-station restrictions; an empty or absent entry means no restriction
    pub reduced_domains: BTreeMap<StationId, BTreeSet<Channel>>,
    pub previous_assignment: BTreeMap<StationId, Channel>,
    pub cutoff: Duration,
    pub seed: u64,
    pub station_config: String,
}

impl SolveRequest {
    pub fn from_question(question: &Question, cutoff: Duration, seed: u64) -> Self {
        Self {
            stations: question.stations.clone(),
            channels: question.channels(),
            reduced_domains: BTreeMap::new(),
            previous_assignment: question.previous_assignment.clone(),
            cutoff,
            seed,
            station_config: question.station_config.clone(),
        }
    }
}

/// The answer to a [`SolveRequest`], with the packing as station to channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacadeResult {
    pub result: SatResult,
    pub runtime_seconds: f64,
    pub witness: BTreeMap<StationId, Channel>,
}

pub struct StationPackingFacade {
    manager: SolverManager,
}

impl StationPackingFacade {
    pub fn new(manager: SolverManager) -> Self {
        Self { manager }
    }

    /// Build the standard pipeline described by `settings`, loading datasets from the
    /// configured data root
    pub fn from_settings(settings: &Settings) -> Self {
        crate::logging::init(&settings.logging.level);
        Self::with_loader(settings, Box::new(FileDatasetLoader::with_root(&settings.data.root)))
    }

    pub fn with_loader(settings: &Settings, loader: Box<dyn DatasetLoader>) -> Self {
        let mut factory = CadicalSolverBundleFactory::new(settings.bundle_options());
        if settings.cache.enabled {
            factory = factory.with_dataset_caches(settings.cache.learn);
        }
        Self::new(SolverManager::new(loader, Box::new(factory)))
    }

    pub fn manager(&mut self) -> &mut SolverManager {
        &mut self.manager
    }

    pub fn solve(&mut self, request: &SolveRequest) -> Result<FacadeResult, FacadeError> {
        if request.stations.is_empty() {
            warn!("Provided an empty set of stations.");
            return Ok(FacadeResult {
                result: SatResult::Sat,
                runtime_seconds: 0.0,
                witness: BTreeMap::new(),
            });
        }
        if request.cutoff.is_zero() {
            return Err(FacadeError::InvalidCutoff(request.cutoff));
        }

        let bundle = self.manager.get_data(&request.station_config)?;

        debug!("Building domains.");
        let mut domains = BTreeMap::new();
        for &station in &request.stations {
            let mut domain: BTreeSet<Channel> = bundle
                .stations()
                .domain(station)?
                .intersection(&request.channels)
                .copied()
                .collect();
            if let Some(reduced) = request.reduced_domains.get(&station) {
                if !reduced.is_empty() {
                    domain.retain(|channel| reduced.contains(channel));
                }
            }
            domains.insert(station, domain);
        }
        let instance = StationPackingInstance::new(domains, request.previous_assignment.clone());

        let criterion = DisjunctiveCompositeTerminationCriterion::new(vec![
            Box::new(CpuTimeTerminationCriterion::starting_now(request.cutoff))
                as Box<dyn TerminationCriterion>,
            Box::new(WalltimeTerminationCriterion::starting_now(request.cutoff)),
        ]);

        info!("Solving {} ({}).", instance, request.station_config);
        let result = bundle.solver().solve(&instance, &criterion, request.seed);
        info!("Result: {}", result);

        Ok(FacadeResult {
            result: result.result,
            runtime_seconds: result.runtime.as_secs_f64(),
            witness: station_channels(&result.assignment),
        })
    }

    pub fn solve_question(
        &mut self,
        question: &Question,
        cutoff: Duration,
        seed: u64,
    ) -> Result<FacadeResult, FacadeError> {
        self.solve(&SolveRequest::from_question(question, cutoff, seed))
    }

    pub fn notify_shutdown(&mut self) {
        info!("Shutting down...");
        self.manager.notify_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::io::{DOMAIN_FILE, INTERFERENCE_FILE};
    use tempfile::tempdir;

    fn facade_over(dir: &std::path::Path) -> StationPackingFacade {
        let dataset = dir.join("tiny");
        std::fs::create_dir_all(&dataset).unwrap();
        std::fs::write(dataset.join(DOMAIN_FILE), "DOMAIN,1,14,15,16\nDOMAIN,2,14,15,16\nDOMAIN,3,14\n")
            .unwrap();
        std::fs::write(dataset.join(INTERFERENCE_FILE), "CO,1,2,3\nCO,2,3\n").unwrap();

        let settings = Settings::default();
        StationPackingFacade::with_loader(&settings, Box::new(FileDatasetLoader::with_root(dir)))
    }

    fn request(stations: &[u32], channels: &[Channel]) -> SolveRequest {
        SolveRequest {
            stations: stations.iter().map(|&s| StationId(s)).collect(),
            channels: channels.iter().copied().collect(),
            cutoff: Duration::from_secs(10),
            station_config: "tiny".to_string(),
            ..SolveRequest::default()
        }
    }

    #[test]
    fn test_solve_packs_interfering_stations_apart() {
        let dir = tempdir().unwrap();
        let mut facade = facade_over(dir.path());

        let result = facade.solve(&request(&[1, 2, 3], &[14, 15, 16])).unwrap();
        assert_eq!(result.result, SatResult::Sat);
        assert_eq!(result.witness[&StationId(3)], 14);
        assert_ne!(result.witness[&StationId(1)], 14);
        assert_ne!(result.witness[&StationId(1)], result.witness[&StationId(2)]);
    }

    #[test]
    fn test_channel_restriction_makes_unsat() {
        let dir = tempdir().unwrap();
        let mut facade = facade_over(dir.path());

        let result = facade.solve(&request(&[1, 2], &[15])).unwrap();
        assert_eq!(result.result, SatResult::Unsat);
        assert!(result.witness.is_empty());
    }

    #[test]
    fn test_reduced_domains_apply() {
        let dir = tempdir().unwrap();
        let mut facade = facade_over(dir.path());

        let mut req = request(&[1], &[14, 15, 16]);
        req.reduced_domains.insert(StationId(1), BTreeSet::from([16]));
        let result = facade.solve(&req).unwrap();
        assert_eq!(result.witness[&StationId(1)], 16);
    }

    #[test]
    fn test_input_checks() {
        let dir = tempdir().unwrap();
        let mut facade = facade_over(dir.path());

        let empty = facade.solve(&request(&[], &[14])).unwrap();
        assert_eq!(empty.result, SatResult::Sat);

        let mut zero = request(&[1], &[14]);
        zero.cutoff = Duration::ZERO;
        assert!(matches!(facade.solve(&zero), Err(FacadeError::InvalidCutoff(_))));

        let mut missing = request(&[1], &[14]);
        missing.station_config = "nowhere".to_string();
        assert!(matches!(
            facade.solve(&missing),
            Err(FacadeError::Manager(ManagerError::Data(DataError::NotFound(_))))
        ));

        assert!(matches!(
            facade.solve(&request(&[99], &[14])),
            Err(FacadeError::Data(DataError::UnknownStation(StationId(99))))
        ));
    }
}
