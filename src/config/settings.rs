//! Configuration settings for the station packing solver

use crate::manager::BundleOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub solver: SolverConfig,
    pub presolver: PresolverConfig,
    pub cache: CacheConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    pub seed: u64,
    pub cutoff_seconds: f64,
    /// CaDiCaL configuration: default, plain, sat or unsat
    pub engine_config: String,
    pub timer_grace_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresolverConfig {
    pub enabled: bool,
    pub max_missing_stations: usize,
    pub max_to_pack: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Record instances proven UNSAT by search
    pub learn: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory dataset keys are resolved against
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub cnf_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            solver: SolverConfig {
                seed: 0,
                cutoff_seconds: 60.0,
                engine_config: crate::sat::solver::DEFAULT_CONFIG.to_string(),
                timer_grace_seconds: 3.0,
            },
            presolver: PresolverConfig {
                enabled: true,
                max_missing_stations: crate::solvers::neighborhood::DEFAULT_MAX_MISSING_STATIONS,
                max_to_pack: crate::solvers::neighborhood::DEFAULT_MAX_TO_PACK,
            },
            cache: CacheConfig {
                enabled: true,
                learn: true,
            },
            data: DataConfig {
                root: PathBuf::from("data"),
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                cnf_directory: PathBuf::from("output/cnfs"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !positive_seconds(self.solver.cutoff_seconds) {
            anyhow::bail!("Cutoff must be strictly positive");
        }

        if !positive_seconds(self.solver.timer_grace_seconds) {
            anyhow::bail!("Timer grace period must be strictly positive");
        }

        if self.solver.engine_config.trim().is_empty() {
            anyhow::bail!("Engine configuration must not be empty");
        }

        if self.presolver.max_to_pack == 0 {
            anyhow::bail!("Presolver neighborhood bound must be positive");
        }

        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            anyhow::bail!("Unknown log level: {}", self.logging.level);
        }

        Ok(())
    }

    pub fn cutoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.solver.cutoff_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn timer_grace(&self) -> Duration {
        Duration::try_from_secs_f64(self.solver.timer_grace_seconds)
            .unwrap_or(crate::sat::incremental::DEFAULT_TIMER_GRACE)
    }

    pub fn bundle_options(&self) -> BundleOptions {
        BundleOptions {
            engine_config: self.solver.engine_config.clone(),
            seed: self.solver.seed,
            timer_grace: self.timer_grace(),
            presolve: self.presolver.enabled,
            max_missing_stations: self.presolver.max_missing_stations,
            max_to_pack: self.presolver.max_to_pack,
        }
    }

    /// Merge settings with command line overrides
    pub fn merge_with_cli(&mut self, cli_overrides: &CliOverrides) {
        if let Some(cutoff) = cli_overrides.cutoff_seconds {
            self.solver.cutoff_seconds = cutoff;
        }
        if let Some(seed) = cli_overrides.seed {
            self.solver.seed = seed;
        }
        if let Some(ref root) = cli_overrides.data_root {
            self.data.root = root.clone();
        }
        if let Some(ref cnf_directory) = cli_overrides.cnf_directory {
            self.output.cnf_directory = cnf_directory.clone();
        }
        if let Some(format) = cli_overrides.format {
            self.output.format = format;
        }
        if cli_overrides.no_presolve {
            self.presolver.enabled = false;
        }
        if cli_overrides.verbose {
            self.logging.level = "debug".to_string();
        }
    }
}

fn positive_seconds(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}

/// Command line overrides for settings
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub cutoff_seconds: Option<f64>,
    pub seed: Option<u64>,
    pub data_root: Option<PathBuf>,
    pub cnf_directory: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub no_presolve: bool,
    pub verbose: bool,
}
