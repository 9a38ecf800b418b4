pub mod external;
pub mod logging;
pub mod report;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use shiftjack::simulation::card_source::{
    CardSource, DelegatedCardSource, FallbackPolicy, RetryPolicy, UniformCardSource,
};
use thiserror::Error;
use tracing::Level;

use crate::external::ExternalCommandOracle;

pub const DEFAULT_CONFIG_PATH: &str = "~/.shiftjack.yml";
const DEFAULT_CONFIG_FILE_NAME: &str = ".shiftjack.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rule: ConfigRule,
    pub simulator: ConfigSimulator,
    #[serde(default)]
    pub logging: ConfigLogging,
}

impl Config {
    /// Checks every field that serde alone cannot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.simulator.validate()?;
        self.logging.level()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRule {
    #[serde(default = "default_true")]
    pub dealer_hit_on_soft17: bool,
}

impl Default for ConfigRule {
    fn default() -> Self {
        Self {
            dealer_hit_on_soft17: true,
        }
    }
}

impl From<ConfigRule> for shiftjack::Rule {
    fn from(rule: ConfigRule) -> Self {
        shiftjack::Rule {
            dealer_hit_on_soft17: rule.dealer_hit_on_soft17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSimulator {
    pub rounds: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub card_source: ConfigCardSource,
}

impl ConfigSimulator {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.rounds == 0 {
            return Err(ValidationError::invalid(
                "simulator.rounds",
                "must be greater than zero",
            ));
        }
        if self.progress_interval == 0 {
            return Err(ValidationError::invalid(
                "simulator.progress_interval",
                "must be greater than zero",
            ));
        }
        self.card_source.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardSourceKind {
    #[default]
    Uniform,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCardSource {
    #[serde(default)]
    pub kind: CardSourceKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

impl Default for ConfigCardSource {
    fn default() -> Self {
        Self {
            kind: CardSourceKind::Uniform,
            command: None,
            args: Vec::new(),
            max_attempts: default_max_attempts(),
            fallback: default_fallback(),
        }
    }
}

impl TryInto<RetryPolicy> for &ConfigCardSource {
    type Error = serde::de::value::Error;

    fn try_into(self) -> Result<RetryPolicy, Self::Error> {
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            fallback: self.fallback.parse::<FallbackPolicy>()?,
        })
    }
}

impl ConfigCardSource {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "simulator.card_source.max_attempts",
                "must be greater than zero",
            ));
        }
        let _: RetryPolicy = self.try_into().map_err(|_| {
            ValidationError::invalid(
                "simulator.card_source.fallback",
                format!("unknown fallback policy {:?}", self.fallback),
            )
        })?;
        if self.kind == CardSourceKind::External
            && self.command.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(ValidationError::invalid(
                "simulator.card_source.command",
                "an External card source needs a command",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLogging {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for ConfigLogging {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl ConfigLogging {
    pub fn level(&self) -> Result<Level, ValidationError> {
        self.level
            .trim()
            .parse()
            .map_err(|_| ValidationError::invalid("logging.level", format!("{:?}", self.level)))
    }
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    100
}

fn default_output() -> PathBuf {
    PathBuf::from("results.json")
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_fallback() -> String {
    RetryPolicy::default().fallback.to_string()
}

fn default_level() -> String {
    String::from("info")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot find home directory")]
    NoHomeDir,
    #[error("config file {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// Turns the `~/.shiftjack.yml` placeholder into a real path under the home directory.
/// Any other path is returned as given.
pub fn resolve_config_path(config: &str) -> Result<PathBuf, ConfigError> {
    if config != DEFAULT_CONFIG_PATH {
        return Ok(PathBuf::from(config));
    }
    let home_dir = home::home_dir().ok_or(ConfigError::NoHomeDir)?;
    let config_file_path = home_dir.join(DEFAULT_CONFIG_FILE_NAME);
    if !config_file_path.is_file() {
        return Err(ConfigError::NotFound(config_file_path));
    }
    Ok(config_file_path)
}

/// Reads the content of a given config file, parses it to a `Config` and validates it.
pub fn parse_config_from_file(filename: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = filename.as_ref().to_path_buf();
    let file = File::open(&path).map_err(|source| ConfigError::Read {
        source,
        path: path.clone(),
    })?;
    let config: Config =
        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            source,
            path: path.clone(),
        })?;
    config
        .validate()
        .map_err(|source| ConfigError::Invalid { path, source })?;
    Ok(config)
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Builds the card source a run draws from. `seed` drives the uniform source, or the
/// fallback substitutions of an external one.
pub fn build_card_source(
    config: &ConfigCardSource,
    seed: Option<u64>,
) -> Result<Box<dyn CardSource>, ValidationError> {
    let rng = rng_from_seed(seed);
    match config.kind {
        CardSourceKind::Uniform => Ok(Box::new(UniformCardSource::new(rng))),
        CardSourceKind::External => {
            let command = config
                .command
                .clone()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    ValidationError::invalid(
                        "simulator.card_source.command",
                        "an External card source needs a command",
                    )
                })?;
            let policy: RetryPolicy = config.try_into().map_err(|_| {
                ValidationError::invalid(
                    "simulator.card_source.fallback",
                    format!("unknown fallback policy {:?}", config.fallback),
                )
            })?;
            let oracle = ExternalCommandOracle::new(command, config.args.clone());
            Ok(Box::new(DelegatedCardSource::new(oracle, policy, rng)))
        }
    }
}
