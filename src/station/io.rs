//! Loading station domains and interference constraints from a dataset directory

use super::constraints::ConstraintManager;
use super::station::{Channel, Station, StationId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File holding one `DOMAIN,<station>,<channel>,...` line per station
pub const DOMAIN_FILE: &str = "domains.csv";
/// File holding `CO,<subject>,<target>,...` and `ADJ+1,<subject>,<target>,...` lines
pub const INTERFERENCE_FILE: &str = "interferences.csv";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset not found: {0}")]
    NotFound(PathBuf),
    #[error("{file}:{line}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },
    #[error("unknown station {0}")]
    UnknownStation(StationId),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every station of a dataset, keyed by id
#[derive(Debug, Clone, Default)]
pub struct StationManager {
    stations: BTreeMap<StationId, Station>,
}

impl StationManager {
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Self {
        Self {
            stations: stations.into_iter().map(|s| (s.id(), s)).collect(),
        }
    }

    pub fn station(&self, id: StationId) -> Result<&Station, DataError> {
        self.stations.get(&id).ok_or(DataError::UnknownStation(id))
    }

    pub fn domain(&self, id: StationId) -> Result<&BTreeSet<Channel>, DataError> {
        self.station(id).map(Station::domain)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

/// The station and constraint data of one dataset
#[derive(Debug, Clone, Default)]
pub struct DatasetBundle {
    pub stations: StationManager,
    pub constraints: ConstraintManager,
}

/// Resolves a dataset key to its station and constraint data
pub trait DatasetLoader: Send + Sync {
    fn load(&self, key: &str) -> Result<DatasetBundle, DataError>;
}

/// Reads datasets laid out as a directory holding [`DOMAIN_FILE`] and [`INTERFERENCE_FILE`].
/// Keys are directory paths, resolved against `root` when one is given.
#[derive(Debug, Clone, Default)]
pub struct FileDatasetLoader {
    root: Option<PathBuf>,
}

impl FileDatasetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        }
    }
}

impl DatasetLoader for FileDatasetLoader {
    fn load(&self, key: &str) -> Result<DatasetBundle, DataError> {
        let directory = self.resolve(key);
        if !directory.is_dir() {
            return Err(DataError::NotFound(directory));
        }

        let stations = load_domains(&directory.join(DOMAIN_FILE))?;
        let constraints = load_interferences(&directory.join(INTERFERENCE_FILE), &stations)?;
        debug!(
            "Loaded {} stations from {}.",
            stations.len(),
            directory.display()
        );

        Ok(DatasetBundle {
            stations,
            constraints,
        })
    }
}

fn read_file(path: &Path) -> Result<String, DataError> {
    if !path.is_file() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a CSV line into trimmed, non-empty fields
fn fields(line: &str) -> Vec<&str> {
    line.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    field: &str,
    file: &Path,
    line: usize,
) -> Result<T, DataError> {
    field.parse().map_err(|_| DataError::Parse {
        file: file.to_path_buf(),
        line,
        message: format!("'{}' is not a number", field),
    })
}

/// Parse a domain file. Lines are `DOMAIN,<station>,<channel>,...`; the `DOMAIN` tag is optional.
pub fn load_domains(path: &Path) -> Result<StationManager, DataError> {
    let content = read_file(path)?;
    parse_domains(&content, path)
}

pub fn parse_domains(content: &str, path: &Path) -> Result<StationManager, DataError> {
    let mut stations = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = fields(line);
        if parts.first().is_some_and(|tag| tag.eq_ignore_ascii_case("DOMAIN")) {
            parts.remove(0);
        }

        let Some((id, channels)) = parts.split_first() else {
            return Err(DataError::Parse {
                file: path.to_path_buf(),
                line: index + 1,
                message: "missing station id".to_string(),
            });
        };

        let id = StationId(parse_number(id, path, index + 1)?);
        let domain = channels
            .iter()
            .map(|channel| parse_number::<Channel>(channel, path, index + 1))
            .collect::<Result<BTreeSet<_>, _>>()?;

        stations.push(Station::new(id, domain));
    }

    Ok(StationManager::new(stations))
}

/// Parse an interference file against the stations of `stations`
pub fn load_interferences(
    path: &Path,
    stations: &StationManager,
) -> Result<ConstraintManager, DataError> {
    let content = read_file(path)?;
    parse_interferences(&content, path, stations)
}

pub fn parse_interferences(
    content: &str,
    path: &Path,
    stations: &StationManager,
) -> Result<ConstraintManager, DataError> {
    let mut constraints = ConstraintManager::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts = fields(line);
        if parts.len() < 3 {
            return Err(DataError::Parse {
                file: path.to_path_buf(),
                line: index + 1,
                message: "expected <type>,<subject>,<target>,...".to_string(),
            });
        }

        let subject = StationId(parse_number(parts[1], path, index + 1)?);
        stations.station(subject)?;

        for target in &parts[2..] {
            let target = StationId(parse_number(target, path, index + 1)?);
            stations.station(target)?;

            match parts[0].to_ascii_uppercase().as_str() {
                "CO" => constraints.add_co_interference(subject, target),
                "ADJ+1" => constraints.add_adj_plus_interference(subject, target),
                other => {
                    return Err(DataError::Parse {
                        file: path.to_path_buf(),
                        line: index + 1,
                        message: format!("unknown constraint type '{}'", other),
                    })
                }
            }
        }
    }

    Ok(constraints)
}
