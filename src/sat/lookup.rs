//! A directory of CNF files named after the station set they encode

use super::constraints::{Cnf, DimacsError};
use crate::station::{StationId, StationPackingInstance};
use itertools::Itertools;
use log::{debug, info};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no CNF for this station set at {0}")]
    Missing(PathBuf),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CNF in {path}")]
    Dimacs {
        path: PathBuf,
        #[source]
        source: DimacsError,
    },
}

/// Stores and finds CNFs under `<directory>/<sha1 of station set>.cnf`
#[derive(Debug, Clone)]
pub struct CnfLookup {
    directory: PathBuf,
}

impl CnfLookup {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Hex SHA-1 of the sorted station ids joined with `-`
    pub fn hash_station_set<I: IntoIterator<Item = StationId>>(stations: I) -> String {
        let key = stations.into_iter().sorted().join("-");
        hex::encode(Sha1::digest(key.as_bytes()))
    }

    pub fn cnf_name(instance: &StationPackingInstance) -> String {
        format!("{}.cnf", Self::hash_station_set(instance.stations()))
    }

    pub fn cnf_path(&self, instance: &StationPackingInstance) -> PathBuf {
        self.directory.join(Self::cnf_name(instance))
    }

    pub fn has_cnf(&self, instance: &StationPackingInstance) -> bool {
        self.cnf_path(instance).is_file()
    }

    /// Read back the CNF stored for the stations of `instance`
    pub fn load(&self, instance: &StationPackingInstance) -> Result<Cnf, LookupError> {
        let path = self.cnf_path(instance);
        if !path.is_file() {
            return Err(LookupError::Missing(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|source| LookupError::Io {
            path: path.clone(),
            source,
        })?;
        Cnf::from_dimacs(&content).map_err(|source| LookupError::Dimacs { path, source })
    }

    /// Write `cnf` for `instance`, creating the directory if needed
    pub fn save(
        &self,
        instance: &StationPackingInstance,
        cnf: &Cnf,
        comments: &[String],
    ) -> Result<PathBuf, LookupError> {
        std::fs::create_dir_all(&self.directory).map_err(|source| LookupError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let path = self.cnf_path(instance);
        if path.exists() {
            debug!("Overwriting {}.", path.display());
        }
        std::fs::write(&path, cnf.to_dimacs(comments)).map_err(|source| LookupError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Saved CNF for {} to {}.", instance, path.display());
        Ok(path)
    }
}
