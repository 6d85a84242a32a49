//! Runtime settings for the ingest tool.
//!
//! Settings come from an optional `health_map.toml`, then the
//! `HEALTH_MAP_DATA_DIR` environment variable, then CLI flags (applied by
//! the binary), each overriding the last.

use std::path::{Path, PathBuf};

use health_map_database::paths;
use health_map_ingest_models::UploadFormat;
use health_map_percentile_models::{DEFAULT_PERCENTILE_STEPS, PercentileResolution};
use serde::Deserialize;

use crate::{IngestError, parse_format};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "health_map.toml";
/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "HEALTH_MAP_CONFIG";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "HEALTH_MAP_DATA_DIR";

const STATES_FILE: &str = "states.csv";
const COUNTIES_FILE: &str = "counties.csv";

/// The config file as written.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    data_dir: Option<PathBuf>,
    database: Option<PathBuf>,
    states_file: Option<PathBuf>,
    counties_file: Option<PathBuf>,
    default_format: Option<String>,
    percentile_steps: Option<u32>,
}

/// Resolved ingest settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Directory holding the database and reference files.
    pub data_dir: PathBuf,
    /// Database file; defaults to `<data_dir>/health_map.duckdb`.
    pub database: Option<PathBuf>,
    /// States reference CSV; defaults to `<data_dir>/reference/states.csv`
    /// when that file exists, else the built-in state table.
    pub states_file: Option<PathBuf>,
    /// Counties reference CSV; defaults to
    /// `<data_dir>/reference/counties.csv`.
    pub counties_file: Option<PathBuf>,
    /// Format assumed when an upload does not name one.
    pub default_format: UploadFormat,
    /// Steps in the dense percentile table.
    pub percentile_steps: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: paths::default_data_dir(),
            database: None,
            states_file: None,
            counties_file: None,
            default_format: UploadFormat::ByName,
            percentile_steps: DEFAULT_PERCENTILE_STEPS,
        }
    }
}

impl IngestConfig {
    /// Loads settings from `path`, or from `$HEALTH_MAP_CONFIG`, or from
    /// `./health_map.toml` if it exists, then applies
    /// `$HEALTH_MAP_DATA_DIR`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if an explicitly named file cannot be read,
    /// or any file is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, IngestError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                log::info!("Reading config from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(&path)?)?
            }
            None if Path::new(CONFIG_FILE).exists() => {
                log::info!("Reading config from {CONFIG_FILE}");
                Self::from_toml_str(&std::fs::read_to_string(CONFIG_FILE)?)?
            }
            None => Self::default(),
        };

        config.apply_data_dir_override(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        config.resolution()?;

        Ok(config)
    }

    /// Parses a config file's contents. Unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Toml`] for malformed TOML or unknown keys, and
    /// [`IngestError::Configuration`] for an unknown format.
    pub fn from_toml_str(text: &str) -> Result<Self, IngestError> {
        let raw: RawConfig = toml::from_str(text)?;
        let defaults = Self::default();

        Ok(Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            database: raw.database,
            states_file: raw.states_file,
            counties_file: raw.counties_file,
            default_format: raw
                .default_format
                .as_deref()
                .map(parse_format)
                .transpose()?
                .unwrap_or(defaults.default_format),
            percentile_steps: raw.percentile_steps.unwrap_or(defaults.percentile_steps),
        })
    }

    /// Replaces the data directory if `data_dir` is set.
    pub fn apply_data_dir_override(&mut self, data_dir: Option<PathBuf>) {
        if let Some(dir) = data_dir {
            log::debug!("Data directory overridden to {}", dir.display());
            self.data_dir = dir;
        }
    }

    /// The database file to open.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| paths::database_path(&self.data_dir))
    }

    /// The states reference file, if one should be read.
    #[must_use]
    pub fn states_path(&self) -> Option<PathBuf> {
        self.states_file.clone().or_else(|| {
            let default = paths::reference_dir(&self.data_dir).join(STATES_FILE);
            default.exists().then_some(default)
        })
    }

    /// The counties reference file.
    #[must_use]
    pub fn counties_path(&self) -> PathBuf {
        self.counties_file
            .clone()
            .unwrap_or_else(|| paths::reference_dir(&self.data_dir).join(COUNTIES_FILE))
    }

    /// The percentile table resolution.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Configuration`] if fewer than 2 steps are
    /// configured.
    pub fn resolution(&self) -> Result<PercentileResolution, IngestError> {
        PercentileResolution::new(self.percentile_steps).map_err(|e| IngestError::Configuration {
            message: e.to_string(),
        })
    }
}
