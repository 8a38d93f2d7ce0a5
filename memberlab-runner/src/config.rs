//! Serializable pipeline configuration.
//!
//! ```toml
//! [pipeline]
//! index = "sp500"
//! start = "2013-01-01"
//! end = "2020-12-31"
//!
//! [membership]
//! snapshot_file = "sp_500_historical_components.csv"
//! window_end = "2021-01-08"
//!
//! [prices]
//! provider = "yahoo"
//! workers = 4
//!
//! [symbols.renames]
//! FB = "META"
//!
//! [output]
//! dir = "out"
//! ```

use chrono::{Days, NaiveDate};
use memberlab_core::domain::Month;
use memberlab_core::SymbolMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating a pipeline config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("index '{index}' needs [membership] {field}")]
    MissingSource { index: IndexKind, field: &'static str },

    #[error("provider 'csv' needs [prices] csv_dir")]
    MissingCsvDir,

    #[error("[prices] workers must be at least 1")]
    ZeroWorkers,
}

/// Which index the run reconstructs, and so which pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Daily membership from a ticker history.
    Nasdaq100,
    /// Monthly membership from a snapshot table.
    Sp500,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Nasdaq100 => write!(f, "nasdaq100"),
            IndexKind::Sp500 => write!(f, "sp500"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    pub index: IndexKind,
    /// Inclusive.
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MembershipSection {
    /// Components table for the monthly pipeline.
    #[serde(default)]
    pub snapshot_file: Option<PathBuf>,
    /// Change-log history for the daily pipeline.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// Exclusive upper bound on snapshot dates; defaults to the day after `end`.
    #[serde(default)]
    pub window_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricesSection {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Run the membership stages only.
    #[serde(default)]
    pub skip: bool,
}

impl Default for PricesSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            csv_dir: None,
            workers: default_workers(),
            skip: false,
        }
    }
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolsSection {
    /// `old = "new"`. Absent means the built-in renames.
    #[serde(default)]
    pub renames: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Also write `records.parquet`.
    #[serde(default)]
    pub parquet: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            parquet: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub membership: MembershipSection,
    #[serde(default)]
    pub prices: PricesSection,
    #[serde(default)]
    pub symbols: SymbolsSection,
    #[serde(default)]
    pub output: OutputSection,
}

impl PipelineConfig {
    /// A config with default sections; sources and outputs are filled in by the caller.
    pub fn new(index: IndexKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            pipeline: PipelineSection { index, start, end },
            membership: MembershipSection::default(),
            prices: PricesSection::default(),
            symbols: SymbolsSection::default(),
            output: OutputSection::default(),
        }
    }

    /// Load and validate a config file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let PipelineSection { index, start, end } = self.pipeline;
        if end < start {
            return Err(ConfigError::InvalidRange { start, end });
        }
        match index {
            IndexKind::Nasdaq100 if self.membership.history_file.is_none() => {
                return Err(ConfigError::MissingSource {
                    index,
                    field: "history_file",
                });
            }
            IndexKind::Sp500 if self.membership.snapshot_file.is_none() => {
                return Err(ConfigError::MissingSource {
                    index,
                    field: "snapshot_file",
                });
            }
            _ => {}
        }
        if self.prices.provider == ProviderKind::Csv && self.prices.csv_dir.is_none() {
            return Err(ConfigError::MissingCsvDir);
        }
        if self.prices.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        resolve(&mut self.membership.snapshot_file);
        resolve(&mut self.membership.history_file);
        resolve(&mut self.prices.csv_dir);
        if self.output.dir.is_relative() {
            self.output.dir = base.join(&self.output.dir);
        }
    }

    /// First and last calendar month of the run.
    pub fn months(&self) -> (Month, Month) {
        (
            Month::of(self.pipeline.start),
            Month::of(self.pipeline.end),
        )
    }

    /// Exclusive snapshot cutoff for the monthly pipeline.
    pub fn window_end(&self) -> NaiveDate {
        self.membership.window_end.unwrap_or_else(|| {
            self.pipeline
                .end
                .checked_add_days(Days::new(1))
                .unwrap_or(self.pipeline.end)
        })
    }

    pub fn symbol_map(&self) -> SymbolMap {
        match &self.symbols.renames {
            Some(renames) => SymbolMap::from_renames(renames.clone()),
            None => SymbolMap::default(),
        }
    }

    /// Deterministic BLAKE3 hash of the config, recorded in the run report.
    pub fn config_hash(&self) -> String {
        // serializing plain data into JSON cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
