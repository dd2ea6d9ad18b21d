//! Question files: which dataset, which band and which stations to pack

use super::io::{DataError, StationManager};
use super::station::{Channel, StationId, StationPackingInstance};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Frequency bands a question can ask to pack into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// Low VHF, channels 2 to 6
    Lvhf,
    /// High VHF, channels 7 to 13
    Uvhf,
    /// UHF, channels 14 to 51 without the radio astronomy channel 37
    Uhf,
}

impl Band {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LVHF" => Some(Band::Lvhf),
            "HVHF" | "UVHF" => Some(Band::Uvhf),
            "UHF" | "3" => Some(Band::Uhf),
            _ => None,
        }
    }

    pub fn channels(self) -> BTreeSet<Channel> {
        match self {
            Band::Lvhf => (2..=6).collect(),
            Band::Uvhf => (7..=13).collect(),
            Band::Uhf => (14..=51).filter(|&c| c != 37).collect(),
        }
    }
}

/// A parsed question file.
///
/// ```text
/// STATION_CONFIG,<dataset key>
/// BAND,UHF
/// HIGHEST,36
/// <station>[,<previous channel>]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub station_config: String,
    pub band: Band,
    pub highest: Option<Channel>,
    pub stations: BTreeSet<StationId>,
    pub previous_assignment: BTreeMap<StationId, Channel>,
}

impl Question {
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, DataError> {
        let error = |line: usize, message: String| DataError::Parse {
            file: path.to_path_buf(),
            line,
            message,
        };

        let mut station_config = None;
        let mut band = None;
        let mut highest = None;
        let mut stations = BTreeSet::new();
        let mut previous_assignment = BTreeMap::new();

        for (index, line) in content.lines().enumerate() {
            let line_number = index + 1;
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            let (key, value) = (parts[0], parts.get(1).copied().unwrap_or(""));
            if key.is_empty() || key.starts_with('#') {
                continue;
            }

            match key {
                "STATION_CONFIG" => station_config = Some(value.to_string()),
                "BAND" => {
                    band = Some(Band::parse(value).ok_or_else(|| {
                        error(line_number, format!("unrecognized band '{}'", value))
                    })?)
                }
                "HIGHEST" => {
                    highest = Some(value.parse().map_err(|_| {
                        error(line_number, format!("'{}' is not a channel", value))
                    })?)
                }
                _ => {
                    let Ok(id) = key.parse::<u32>() else {
                        continue;
                    };
                    let station = StationId(id);
                    stations.insert(station);
                    if !value.is_empty() {
                        let channel = value.parse().map_err(|_| {
                            error(line_number, format!("'{}' is not a channel", value))
                        })?;
                        previous_assignment.insert(station, channel);
                    }
                }
            }
        }

        Ok(Self {
            station_config: station_config
                .ok_or_else(|| error(0, "no STATION_CONFIG entry".to_string()))?,
            band: band.ok_or_else(|| error(0, "no BAND entry".to_string()))?,
            highest,
            stations,
            previous_assignment,
        })
    }

    /// Channels of the band, capped at `HIGHEST` when given
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.band
            .channels()
            .into_iter()
            .filter(|&c| self.highest.map_or(true, |highest| c <= highest))
            .collect()
    }

    /// Build the instance: each station's domain intersected with the question's channels
    pub fn to_instance(&self, stations: &StationManager) -> Result<StationPackingInstance, DataError> {
        let channels = self.channels();
        let domains: BTreeMap<StationId, BTreeSet<Channel>> = self
            .stations
            .iter()
            .map(|&station| {
                let domain = stations.domain(station)?;
                Ok((station, domain.intersection(&channels).copied().collect()))
            })
            .collect::<Result<_, DataError>>()?;

        Ok(StationPackingInstance::new(
            domains,
            self.previous_assignment.clone(),
        ))
    }
}
