//! Configuration loading and typed config structures for the production drivers.
//!
//! The configuration lives in `dps-config.yaml`. Every section and field is
//! optional; missing values fall back to the defaults below, which match the
//! behaviour of the drivers when run without a file.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, environment
//! variables, then command-line flags (applied by the binaries).

use std::path::Path;

use dps_assembly::{MixOptions, PairingPolicy};
use dps_sampling::{HadronizerError, ParticleSelection, RunOptions, ToyConfig};
use dps_types::{Schema, SpeciesTally, pdg};
use serde::Deserialize;

/// Configuration file looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dps-config.yaml";

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "DPS_LOG_LEVEL";
/// Environment variable overriding `hadronizer.seed`.
pub const ENV_SEED: &str = "DPS_SEED";
/// Environment variable overriding `sampling.max_attempts`.
pub const ENV_MAX_ATTEMPTS: &str = "DPS_MAX_ATTEMPTS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for {name}")]
    Env {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<HadronizerError> for ConfigError {
    fn from(e: HadronizerError) -> Self {
        Self::Invalid { reason: e.to_string() }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DpsConfig {
    /// Sampling driver settings.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Acceptance selection for enriched sampling.
    #[serde(default = "default_selection")]
    pub selection: ParticleSelection,

    /// Reference hadronizer settings.
    #[serde(default)]
    pub hadronizer: ToyConfig,

    /// Mixing driver settings.
    #[serde(default)]
    pub mixing: MixingConfig,

    /// Absolute PDG codes tallied in written events.
    #[serde(default = "default_species")]
    pub species: Vec<u32>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DpsConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            selection: default_selection(),
            hadronizer: ToyConfig::default(),
            mixing: MixingConfig::default(),
            species: default_species(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DpsConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DPS_LOG_LEVEL` overrides `logging.level`
    /// - `DPS_SEED` overrides `hadronizer.seed`
    /// - `DPS_MAX_ATTEMPTS` overrides `sampling.max_attempts`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and
    /// [`ConfigError::Env`] or [`ConfigError::Invalid`] for bad values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load `explicit` if given, else [`DEFAULT_CONFIG_FILE`] if it exists in
    /// the working directory, else the defaults. Environment overrides apply
    /// in every case.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Self::from_file(fallback);
        }
        tracing::debug!("Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, then apply environment overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(value) = lookup(ENV_SEED) {
            self.hadronizer.seed = parse_override(ENV_SEED, value)?;
        }
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.sampling.max_attempts = parse_override(ENV_MAX_ATTEMPTS, value)?;
        }
        Ok(())
    }

    /// Check ranges that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                reason: "sampling.max_attempts must be at least 1".to_owned(),
            });
        }
        if self.sampling.max_aborts == 0 {
            return Err(ConfigError::Invalid {
                reason: "sampling.max_aborts must be at least 1".to_owned(),
            });
        }
        self.hadronizer.validate()?;
        Ok(())
    }

    /// A fresh tally over the configured species.
    pub fn tally(&self) -> SpeciesTally {
        SpeciesTally::new(self.species.iter().copied())
    }
}

fn parse_override<T: core::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    let parsed = value.trim().parse::<T>();
    parsed.or(Err(ConfigError::Env { name, value }))
}

/// Whether the sampling driver conditions its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowerMode {
    /// Every hadronized state is written, one attempt each.
    Normal,
    /// Only states passing the selection are written, with retries.
    #[default]
    Enriched,
}

impl core::str::FromStr for ShowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "enriched" => Ok(Self::Enriched),
            other => Err(format!("unknown shower mode '{other}' (expected normal or enriched)")),
        }
    }
}

/// Sampling driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SamplingConfig {
    /// Normal or enriched production.
    #[serde(default)]
    pub mode: ShowerMode,

    /// Retry budget per partonic state in enriched mode.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Stop after this many processed states.
    #[serde(default)]
    pub max_events: Option<u64>,

    /// Stop after this many unreadable or rejected partonic states.
    #[serde(default = "default_max_aborts")]
    pub max_aborts: u64,

    /// Progress log interval in processed states.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,

    /// Record schema of the output file.
    #[serde(default = "default_shower_output")]
    pub output_schema: Schema,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: ShowerMode::default(),
            max_attempts: default_max_attempts(),
            max_events: None,
            max_aborts: default_max_aborts(),
            progress_every: default_progress_every(),
            output_schema: default_shower_output(),
        }
    }
}

impl SamplingConfig {
    /// Driver options for this configuration. Normal mode gets one attempt.
    pub const fn run_options(&self) -> RunOptions {
        RunOptions {
            max_attempts: match self.mode {
                ShowerMode::Normal => 1,
                ShowerMode::Enriched => self.max_attempts,
            },
            max_events: self.max_events,
            max_aborts: self.max_aborts,
            progress_every: self.progress_every,
        }
    }
}

/// Mixing driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MixingConfig {
    /// How primary and secondary events are paired.
    #[serde(default)]
    pub policy: PairingPolicy,

    /// Stop after this many composites.
    #[serde(default)]
    pub max_events: Option<u64>,

    /// Progress log interval in composites.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,

    /// Record schema of both input files.
    #[serde(default = "default_mixer_input")]
    pub input_schema: Schema,

    /// Record schema of the output file.
    #[serde(default = "default_mixer_output")]
    pub output_schema: Schema,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            policy: PairingPolicy::default(),
            max_events: None,
            progress_every: default_progress_every(),
            input_schema: default_mixer_input(),
            output_schema: default_mixer_output(),
        }
    }
}

impl MixingConfig {
    /// Driver options for this configuration.
    pub const fn mix_options(&self) -> MixOptions {
        MixOptions {
            policy: self.policy,
            max_events: self.max_events,
            progress_every: self.progress_every,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_selection() -> ParticleSelection {
    ParticleSelection::species(pdg::PHI.unsigned_abs())
}

fn default_species() -> Vec<u32> {
    SpeciesTally::DEFAULT_SPECIES.to_vec()
}

const fn default_max_attempts() -> u32 {
    100
}

const fn default_max_aborts() -> u64 {
    10
}

const fn default_progress_every() -> u64 {
    100
}

const fn default_shower_output() -> Schema {
    Schema::Rich
}

const fn default_mixer_input() -> Schema {
    Schema::Rich
}

const fn default_mixer_output() -> Schema {
    Schema::Minimal
}

fn default_log_level() -> String {
    "info".to_owned()
}
