//! Configuration management for the station packing solver

pub mod settings;

pub use settings::{
    CacheConfig, CliOverrides, DataConfig, LoggingConfig, OutputConfig, OutputFormat,
    PresolverConfig, Settings, SolverConfig,
};
