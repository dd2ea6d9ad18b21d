//! Interference constraints between stations

use super::station::{Assignment, Channel, StationId, StationPackingInstance};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

static NO_STATIONS: BTreeSet<StationId> = BTreeSet::new();

/// Holds the co-channel and adjacent-channel interference relations of a dataset.
///
/// Co-channel interference is symmetric: two interfering stations may not share a
/// channel. Adjacent-channel interference is directional: if `target` is in the
/// ADJ+1 set of `subject`, then `subject` on channel `c` forbids `target` on `c + 1`.
#[derive(Debug, Clone, Default)]
pub struct ConstraintManager {
    co_interfering: BTreeMap<StationId, BTreeSet<StationId>>,
    adj_plus_interfering: BTreeMap<StationId, BTreeSet<StationId>>,
}

impl ConstraintManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `a` and `b` may not share a channel
    pub fn add_co_interference(&mut self, a: StationId, b: StationId) {
        if a == b {
            return;
        }
        self.co_interfering.entry(a).or_default().insert(b);
        self.co_interfering.entry(b).or_default().insert(a);
    }

    /// Record that `subject` on channel `c` forbids `target` on channel `c + 1`
    pub fn add_adj_plus_interference(&mut self, subject: StationId, target: StationId) {
        self.adj_plus_interfering
            .entry(subject)
            .or_default()
            .insert(target);
    }

    pub fn co_interfering_stations(&self, station: StationId) -> &BTreeSet<StationId> {
        self.co_interfering.get(&station).unwrap_or(&NO_STATIONS)
    }

    pub fn adj_plus_interfering_stations(&self, station: StationId) -> &BTreeSet<StationId> {
        self.adj_plus_interfering
            .get(&station)
            .unwrap_or(&NO_STATIONS)
    }

    /// Whether any constraint, in either direction, links `a` and `b`
    pub fn interferes(&self, a: StationId, b: StationId) -> bool {
        self.co_interfering_stations(a).contains(&b)
            || self.adj_plus_interfering_stations(a).contains(&b)
            || self.adj_plus_interfering_stations(b).contains(&a)
    }

    /// Undirected interference graph restricted to the stations of `instance`
    pub fn interference_graph(
        &self,
        instance: &StationPackingInstance,
    ) -> BTreeMap<StationId, BTreeSet<StationId>> {
        let stations = instance.station_set();
        let mut graph: BTreeMap<StationId, BTreeSet<StationId>> = stations
            .iter()
            .map(|&station| (station, BTreeSet::new()))
            .collect();

        for &station in &stations {
            let neighbours = self
                .co_interfering_stations(station)
                .iter()
                .chain(self.adj_plus_interfering_stations(station))
                .filter(|other| **other != station && stations.contains(*other));

            for &other in neighbours {
                graph.entry(station).or_default().insert(other);
                graph.entry(other).or_default().insert(station);
            }
        }

        graph
    }

    /// Channels `station` may not take while `fixed` sits on `fixed_channel`
    pub fn forbidden_channels(
        &self,
        station: StationId,
        fixed: StationId,
        fixed_channel: Channel,
    ) -> Vec<Channel> {
        let mut forbidden = Vec::new();
        if self.co_interfering_stations(station).contains(&fixed) {
            forbidden.push(fixed_channel);
        }
        if self.adj_plus_interfering_stations(station).contains(&fixed) {
            forbidden.push(fixed_channel - 1);
        }
        if self.adj_plus_interfering_stations(fixed).contains(&station) {
            forbidden.push(fixed_channel + 1);
        }
        forbidden
    }

    /// Check that no interference constraint is violated by `assignment`
    pub fn is_satisfying_assignment(&self, assignment: &Assignment) -> bool {
        for (&channel, stations) in assignment {
            for &station in stations {
                if let Some(other) = self
                    .co_interfering_stations(station)
                    .intersection(stations)
                    .next()
                {
                    debug!(
                        "Stations {} and {} share channel {} but interfere.",
                        station, other, channel
                    );
                    return false;
                }

                if let Some(above) = assignment.get(&(channel + 1)) {
                    if let Some(other) = self
                        .adj_plus_interfering_stations(station)
                        .intersection(above)
                        .next()
                    {
                        debug!(
                            "Station {} on {} and station {} on {} violate an adjacent-channel constraint.",
                            station,
                            channel,
                            other,
                            channel + 1
                        );
                        return false;
                    }
                }
            }
        }
        true
    }
}
