//! Variable numbering for the station packing SAT encoding

use crate::station::{Channel, StationId, StationPackingInstance};
use std::collections::{BTreeMap, BTreeSet};

/// Maps every (station, channel) pair of an instance to a positive SAT variable.
///
/// Stations and channels get dense 0-based ranks in sorted order, and the pair
/// `(s, c)` becomes `rank(s) * num_channels + rank(c) + 1`. The numbering depends only
/// on the sorted membership of both sets, so it can be rebuilt at decode time.
#[derive(Debug, Clone)]
pub struct VariableNumbering {
    stations: Vec<StationId>,
    channels: Vec<Channel>,
    station_index: BTreeMap<StationId, usize>,
    channel_index: BTreeMap<Channel, usize>,
}

impl VariableNumbering {
    /// Number the stations of `instance` over the union of its domains
    pub fn new(instance: &StationPackingInstance) -> Self {
        Self::from_sets(&instance.station_set(), &instance.all_channels())
    }

    pub fn from_sets(stations: &BTreeSet<StationId>, channels: &BTreeSet<Channel>) -> Self {
        let stations: Vec<_> = stations.iter().copied().collect();
        let channels: Vec<_> = channels.iter().copied().collect();
        let station_index = stations.iter().enumerate().map(|(i, &s)| (s, i)).collect();
        let channel_index = channels.iter().enumerate().map(|(i, &c)| (c, i)).collect();

        Self {
            stations,
            channels,
            station_index,
            channel_index,
        }
    }

    /// Variable for station at rank `station_index` on the channel at rank `channel_index`
    pub fn get_variable(&self, station_index: usize, channel_index: usize) -> i32 {
        (station_index * self.channels.len() + channel_index + 1) as i32
    }

    /// Variable of `(station, channel)`, if both belong to the numbering
    pub fn variable(&self, station: StationId, channel: Channel) -> Option<i32> {
        let s = *self.station_index.get(&station)?;
        let c = *self.channel_index.get(&channel)?;
        Some(self.get_variable(s, c))
    }

    /// Inverse of [`VariableNumbering::variable`]
    pub fn station_channel(&self, variable: i32) -> Option<(StationId, Channel)> {
        if variable <= 0 || variable as usize > self.variable_count() {
            return None;
        }
        let index = variable as usize - 1;
        let num_channels = self.channels.len();
        Some((self.stations[index / num_channels], self.channels[index % num_channels]))
    }

    pub fn station_rank(&self, station: StationId) -> Option<usize> {
        self.station_index.get(&station).copied()
    }

    pub fn channel_rank(&self, channel: Channel) -> Option<usize> {
        self.channel_index.get(&channel).copied()
    }

    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// `|stations| * |channels|`
    pub fn variable_count(&self) -> usize {
        self.stations.len() * self.channels.len()
    }
}
