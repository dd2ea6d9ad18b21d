//! Station data: packing instances, interference constraints and dataset loading

pub mod constraints;
pub mod io;
pub mod question;
pub mod station;

pub use constraints::ConstraintManager;
pub use io::{DataError, DatasetBundle, DatasetLoader, FileDatasetLoader, StationManager};
pub use question::{Band, Question};
pub use station::{
    assignment_from_station_channels, station_channels, Assignment, Channel, Station, StationId,
    StationPackingInstance,
};
