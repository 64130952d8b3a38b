use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::HumId;
use crate::error::ConvertError;

/// On-disk config file model (`humdb-conv.json`). Every field is optional;
/// command-line flags override whatever the file provides.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub input_dir: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub unified: Option<bool>,
    /// Restricts the run to the listed document ids; empty means all.
    #[serde(default)]
    pub hum_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub input_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub cache_dir: Option<Utf8PathBuf>,
    pub workers: usize,
    pub unified: bool,
    pub hum_ids: Vec<HumId>,
}

/// Command-line values layered on top of the file config.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub input_dir: Option<String>,
    pub output_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub workers: Option<usize>,
    pub unified: bool,
    pub hum_ids: Vec<String>,
}

pub const DEFAULT_WORKERS: usize = 4;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, overrides: &Overrides) -> Result<ResolvedConfig, ConvertError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("humdb-conv.json"),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| ConvertError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| ConvertError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(ConvertError::ConfigRead(config_path));
        } else {
            Config::default()
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: &Overrides,
    ) -> Result<ResolvedConfig, ConvertError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let input_dir = overrides
            .input_dir
            .clone()
            .or(config.input_dir)
            .ok_or(ConvertError::MissingConfig)?;
        let output_dir = overrides
            .output_dir
            .clone()
            .or(config.output_dir)
            .ok_or(ConvertError::MissingConfig)?;
        let cache_dir = overrides.cache_dir.clone().or(config.cache_dir);

        let workers = overrides
            .workers
            .or(config.workers)
            .unwrap_or(DEFAULT_WORKERS);
        let unified = overrides.unified || config.unified.unwrap_or(false);

        let hum_ids = if overrides.hum_ids.is_empty() {
            &config.hum_ids
        } else {
            &overrides.hum_ids
        };
        let hum_ids = hum_ids
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<HumId>, ConvertError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            input_dir: Utf8PathBuf::from(input_dir),
            output_dir: Utf8PathBuf::from(output_dir),
            cache_dir: cache_dir.map(Utf8PathBuf::from),
            workers,
            unified,
            hum_ids,
        })
    }
}
