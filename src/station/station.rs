//! Stations, packing instances and channel assignments

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A broadcast channel number
pub type Channel = i32;

/// Channel to stations packed on that channel
pub type Assignment = BTreeMap<Channel, BTreeSet<StationId>>;

/// Identity of a station, ordered by its numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub u32);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StationId {
    fn from(id: u32) -> Self {
        StationId(id)
    }
}

/// A transmitter together with every channel it may ever be packed into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    id: StationId,
    domain: BTreeSet<Channel>,
}

impl Station {
    pub fn new(id: StationId, domain: BTreeSet<Channel>) -> Self {
        Self { id, domain }
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn domain(&self) -> &BTreeSet<Channel> {
        &self.domain
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl PartialOrd for Station {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Station {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// A station packing problem: the effective domain of every station to pack, plus an
/// optional previous assignment that presolvers may use as a hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationPackingInstance {
    domains: BTreeMap<StationId, BTreeSet<Channel>>,
    previous_assignment: BTreeMap<StationId, Channel>,
}

impl StationPackingInstance {
    /// Create an instance. Previous channels of stations outside the instance are dropped.
    pub fn new(
        domains: BTreeMap<StationId, BTreeSet<Channel>>,
        previous_assignment: BTreeMap<StationId, Channel>,
    ) -> Self {
        let previous_assignment = previous_assignment
            .into_iter()
            .filter(|(station, _)| domains.contains_key(station))
            .collect();

        Self {
            domains,
            previous_assignment,
        }
    }

    /// Create an instance without a previous assignment
    pub fn with_domains(domains: BTreeMap<StationId, BTreeSet<Channel>>) -> Self {
        Self::new(domains, BTreeMap::new())
    }

    /// Stations in increasing id order
    pub fn stations(&self) -> impl Iterator<Item = StationId> + '_ {
        self.domains.keys().copied()
    }

    pub fn station_set(&self) -> BTreeSet<StationId> {
        self.domains.keys().copied().collect()
    }

    pub fn num_stations(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, station: StationId) -> bool {
        self.domains.contains_key(&station)
    }

    pub fn domain(&self, station: StationId) -> Option<&BTreeSet<Channel>> {
        self.domains.get(&station)
    }

    pub fn domains(&self) -> &BTreeMap<StationId, BTreeSet<Channel>> {
        &self.domains
    }

    pub fn previous_assignment(&self) -> &BTreeMap<StationId, Channel> {
        &self.previous_assignment
    }

    /// Union of all station domains, which is the channel set the encoding ranges over
    pub fn all_channels(&self) -> BTreeSet<Channel> {
        self.domains.values().flatten().copied().collect()
    }

    pub fn has_empty_domain(&self) -> bool {
        self.domains.values().any(BTreeSet::is_empty)
    }

    /// The sub-instance over `stations`, keeping their domains and previous channels
    pub fn restricted_to(&self, stations: &BTreeSet<StationId>) -> Self {
        let domains = self
            .domains
            .iter()
            .filter(|(station, _)| stations.contains(station))
            .map(|(station, domain)| (*station, domain.clone()))
            .collect();

        Self::new(domains, self.previous_assignment.clone())
    }

    /// Human readable name, `<channels>_<stations>` each joined with `-`
    pub fn name(&self) -> String {
        format!(
            "{}_{}",
            self.all_channels().iter().join("-"),
            self.stations().join("-")
        )
    }
}

impl fmt::Display for StationPackingInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stations over {} channels",
            self.num_stations(),
            self.all_channels().len()
        )
    }
}

/// Flatten an assignment into station to channel form
pub fn station_channels(assignment: &Assignment) -> BTreeMap<StationId, Channel> {
    assignment
        .iter()
        .flat_map(|(&channel, stations)| stations.iter().map(move |&station| (station, channel)))
        .collect()
}

/// Group a station to channel map by channel
pub fn assignment_from_station_channels(channels: &BTreeMap<StationId, Channel>) -> Assignment {
    let mut assignment = Assignment::new();
    for (&station, &channel) in channels {
        assignment.entry(channel).or_default().insert(station);
    }
    assignment
}
