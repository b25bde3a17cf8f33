//! Configuration loading and path resolution
//!
//! Paths resolve with the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const MASTER_FILE_ENV: &str = "APC_MASTER_FILE";
pub const PUBLISHER_MAP_ENV: &str = "APC_PUBLISHER_MAP";
pub const DEFAULT_CONFIG_FILE: &str = "apc-merge.toml";

const DEFAULT_DATA_DIR: &str = "data";
const MASTER_FILE_NAME: &str = "apc_se.csv";
const PUBLISHER_MAP_FILE_NAME: &str = "publisher_name_map.tsv";

/// Optional settings from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Directory holding the master file and publisher map
    pub data_dir: Option<PathBuf>,
    /// Explicit master file path (overrides data_dir)
    pub master_file: Option<PathBuf>,
    /// Explicit publisher map path (overrides data_dir)
    pub publisher_map_file: Option<PathBuf>,
}

impl TomlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }
}

/// Resolved file locations for one session.
#[derive(Debug, Clone)]
pub struct Paths {
    pub master_file: PathBuf,
    pub publisher_map_file: PathBuf,
}

/// Resolve master and publisher-map paths.
///
/// An explicitly requested config file must load; a missing default config
/// file is fine and falls through to the compiled defaults.
pub fn resolve_paths(
    cli_master: Option<PathBuf>,
    cli_map: Option<PathBuf>,
    config_file: Option<&Path>,
) -> Result<Paths> {
    let toml_config = match config_file {
        Some(path) => TomlConfig::load(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                TomlConfig::load(default)?
            } else {
                TomlConfig::default()
            }
        }
    };

    let data_dir = toml_config
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let master_file = cli_master
        .or_else(|| std::env::var(MASTER_FILE_ENV).ok().map(PathBuf::from))
        .or_else(|| toml_config.master_file.clone())
        .unwrap_or_else(|| data_dir.join(MASTER_FILE_NAME));

    let publisher_map_file = cli_map
        .or_else(|| std::env::var(PUBLISHER_MAP_ENV).ok().map(PathBuf::from))
        .or_else(|| toml_config.publisher_map_file.clone())
        .unwrap_or_else(|| data_dir.join(PUBLISHER_MAP_FILE_NAME));

    Ok(Paths {
        master_file,
        publisher_map_file,
    })
}
