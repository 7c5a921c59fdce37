//! TOML configuration file loading
//!
//! Supports `~/.config/beacon-discovery/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryConfigFile {
    /// Framework identity; generated per process when absent
    #[serde(default)]
    pub framework_uuid: Option<String>,

    /// Advertisement and browsing
    #[serde(default)]
    pub discovery: DiscoveryFileConfig,

    /// Local dispatcher access point
    #[serde(default)]
    pub dispatcher: DispatcherFileConfig,

    /// EDEF folder watching
    #[serde(default)]
    pub edef: EdefFileConfig,
}

/// Advertisement and browsing configuration
#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryFileConfig {
    /// Service type of dispatcher records
    pub dispatcher_type: Option<String>,

    /// Service type of endpoint records
    pub endpoint_type: Option<String>,

    /// Advertisement TTL in seconds
    pub ttl: Option<u32>,

    /// Resolution attempts per discovered record
    pub resolve_retries: Option<u32>,

    /// Delay between resolution attempts, in milliseconds
    pub retry_delay_ms: Option<u64>,

    /// Address to advertise (defaults to every host address)
    pub address: Option<String>,
}

/// Dispatcher access configuration
#[derive(Debug, Default, Deserialize)]
pub struct DispatcherFileConfig {
    pub port: Option<u16>,
    pub path: Option<String>,
}

/// EDEF folder configuration
#[derive(Debug, Default, Deserialize)]
pub struct EdefFileConfig {
    /// Folder of `*.xml` EDEF files to import
    pub watch_dir: Option<String>,

    /// Folder scan interval, in seconds
    pub scan_interval_secs: Option<u64>,
}

/// Parse a configuration file's content
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<DiscoveryConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `DiscoveryConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DiscoveryConfigFile {
    config_file_path().map_or_else(DiscoveryConfigFile::default, |path| {
        load_config_file_at(&path)
    })
}

/// Load a TOML config file from an explicit path
///
/// Returns `DiscoveryConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_at(path: &Path) -> DiscoveryConfigFile {
    if !path.exists() {
        return DiscoveryConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                DiscoveryConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DiscoveryConfigFile::default()
        }
    }
}

/// Read a config file the user named explicitly
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or invalid
pub fn read_config_file(path: &Path) -> Result<DiscoveryConfigFile> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let config = parse_config_file(&std::fs::read_to_string(path)?)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/beacon-discovery/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("beacon-discovery").join("config.toml"))
}
