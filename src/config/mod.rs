//! Configuration management for the discovery daemon

pub mod file;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use self::file::DiscoveryConfigFile;
use crate::{Error, Result};

/// Default service type of dispatcher records
pub const DEFAULT_DISPATCHER_TYPE: &str = "_rs-dispatcher._tcp.local.";

/// Default service type of endpoint records
pub const DEFAULT_ENDPOINT_TYPE: &str = "_rs-endpoint._tcp.local.";

/// Discovery daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity of this framework instance
    pub framework_uuid: String,

    /// Advertisement and browsing
    pub discovery: DiscoveryConfig,

    /// Local dispatcher access point
    pub dispatcher: DispatcherConfig,

    /// EDEF folder watching
    pub edef: EdefConfig,
}

/// Advertisement and browsing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub dispatcher_type: String,
    pub endpoint_type: String,

    /// Advertisement TTL in seconds
    pub ttl: u32,

    /// Resolution attempts per discovered record
    pub resolve_retries: u32,

    /// Delay between resolution attempts
    pub retry_delay: Duration,

    /// Advertised address; `None` advertises every host address
    pub address: Option<IpAddr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dispatcher_type: DEFAULT_DISPATCHER_TYPE.to_string(),
            endpoint_type: DEFAULT_ENDPOINT_TYPE.to_string(),
            ttl: 60,
            resolve_retries: 10,
            retry_delay: Duration::from_millis(200),
            address: None,
        }
    }
}

/// Dispatcher access configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub port: u16,
    pub path: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            path: "/dispatcher".to_string(),
        }
    }
}

/// EDEF folder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdefConfig {
    /// Folder to import EDEF files from; disabled when `None`
    pub watch_dir: Option<PathBuf>,

    pub scan_interval: Duration,
}

impl Default for EdefConfig {
    fn default() -> Self {
        Self {
            watch_dir: None,
            scan_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from the environment and an explicit config file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or invalid, or a setting is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_sources(file::read_config_file(path)?, |key| {
            std::env::var(key).ok()
        })
    }

    /// Merge settings (env > toml > default) and validate the result
    ///
    /// # Errors
    ///
    /// Returns error if a setting is invalid
    pub fn from_sources(
        fc: DiscoveryConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = DiscoveryConfig::default();

        let framework_uuid = env("BEACON_FRAMEWORK_UUID")
            .or(fc.framework_uuid)
            .filter(|uuid| !uuid.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let address = env("BEACON_ADVERTISE_ADDRESS")
            .or(fc.discovery.address)
            .map(|raw| {
                raw.parse::<IpAddr>()
                    .map_err(|e| Error::Config(format!("invalid advertise address '{raw}': {e}")))
            })
            .transpose()?;

        let discovery = DiscoveryConfig {
            dispatcher_type: fc
                .discovery
                .dispatcher_type
                .unwrap_or(defaults.dispatcher_type),
            endpoint_type: fc.discovery.endpoint_type.unwrap_or(defaults.endpoint_type),
            ttl: parse_env(&env, "BEACON_DISCOVERY_TTL")?
                .or(fc.discovery.ttl)
                .unwrap_or(defaults.ttl),
            resolve_retries: parse_env(&env, "BEACON_RESOLVE_RETRIES")?
                .or(fc.discovery.resolve_retries)
                .unwrap_or(defaults.resolve_retries),
            retry_delay: parse_env(&env, "BEACON_RETRY_DELAY_MS")?
                .or(fc.discovery.retry_delay_ms)
                .map_or(defaults.retry_delay, Duration::from_millis),
            address,
        };

        let dispatcher_defaults = DispatcherConfig::default();
        let dispatcher = DispatcherConfig {
            port: parse_env(&env, "BEACON_DISPATCHER_PORT")?
                .or(fc.dispatcher.port)
                .unwrap_or(dispatcher_defaults.port),
            path: env("BEACON_DISPATCHER_PATH")
                .or(fc.dispatcher.path)
                .unwrap_or(dispatcher_defaults.path),
        };

        let edef = EdefConfig {
            watch_dir: env("BEACON_EDEF_DIR")
                .or(fc.edef.watch_dir)
                .map(PathBuf::from),
            scan_interval: fc
                .edef
                .scan_interval_secs
                .map_or(EdefConfig::default().scan_interval, Duration::from_secs),
        };

        let config = Self {
            framework_uuid,
            discovery,
            dispatcher,
            edef,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for service_type in [&self.discovery.dispatcher_type, &self.discovery.endpoint_type] {
            if !is_service_type(service_type) {
                return Err(Error::Config(format!(
                    "invalid service type '{service_type}', expected '_name._tcp.local.' or '_name._udp.local.'"
                )));
            }
        }

        if self.discovery.dispatcher_type == self.discovery.endpoint_type {
            return Err(Error::Config(
                "dispatcher and endpoint service types must differ".to_string(),
            ));
        }

        if self.discovery.resolve_retries == 0 {
            return Err(Error::Config("resolve_retries must be at least 1".to_string()));
        }

        if !self.dispatcher.path.starts_with('/') {
            return Err(Error::Config(format!(
                "dispatcher path '{}' must start with '/'",
                self.dispatcher.path
            )));
        }

        if self.edef.scan_interval.is_zero() {
            return Err(Error::Config("edef scan interval must be positive".to_string()));
        }

        Ok(())
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

fn is_service_type(service_type: &str) -> bool {
    let Some(name) = service_type
        .strip_suffix("._tcp.local.")
        .or_else(|| service_type.strip_suffix("._udp.local."))
    else {
        return false;
    };
    name.len() > 1 && name.starts_with('_') && !name.contains('.')
}
