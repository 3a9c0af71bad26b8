//! Node configuration loaded from TOML, with environment overrides.
//!
//! ```toml
//! hostkey = "./hostkey.pem"
//! identities = "./identities"
//!
//! [gossip]
//! cache_size = 50
//! degree = 30
//! p2p_address = "127.0.0.1:6001"
//! api_address = "127.0.0.1:7001"
//! ```
//!
//! | variable | overrides |
//! |----------|-----------|
//! | `GOSSIP_P2P_ADDRESS` | `gossip.p2p_address` |
//! | `GOSSIP_API_ADDRESS` | `gossip.api_address` |
//! | `GOSSIP_DEGREE` | `gossip.degree` |
//! | `GOSSIP_CACHE_SIZE` | `gossip.cache_size` |

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::GossipConfig;

const DEFAULT_P2P_ADDRESS: &str = "127.0.0.1:6001";
const DEFAULT_API_ADDRESS: &str = "127.0.0.1:7001";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A setting has an unusable value.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting or variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Everything a node needs to start.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// PEM file of the host key
    pub hostkey: PathBuf,
    /// Identity storage folder
    pub identities: PathBuf,
    /// Engine and scheduler settings
    pub gossip: GossipConfig,
    /// P2P listening address
    pub p2p_address: SocketAddr,
    /// Local API listening address
    pub api_address: SocketAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hostkey: PathBuf::from("./hostkey.pem"),
            identities: PathBuf::from("./identities"),
            gossip: GossipConfig::default(),
            p2p_address: SocketAddr::from(([127, 0, 0, 1], 6001)),
            api_address: SocketAddr::from(([127, 0, 0, 1], 7001)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    hostkey: Option<PathBuf>,
    identities: Option<PathBuf>,
    #[serde(default)]
    gossip: GossipSection,
}

#[derive(Debug, Deserialize, Default)]
struct GossipSection {
    cache_size: Option<usize>,
    degree: Option<usize>,
    max_pending_validations: Option<usize>,
    auto_connect: Option<bool>,
    p2p_address: Option<String>,
    api_address: Option<String>,
}

/// TOML-based configuration provider.
#[derive(Debug)]
pub struct TomlConfigProvider;

impl TomlConfigProvider {
    /// Load a TOML file, then apply the process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<NodeConfig, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        let mut config = Self::parse(&content)?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn parse(content: &str) -> Result<NodeConfig, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = NodeConfig::default();
        let section = file.gossip;

        let mut gossip = defaults.gossip;
        if let Some(cache_size) = section.cache_size {
            gossip.cache_size = positive("gossip.cache_size", cache_size)?;
        }
        if let Some(degree) = section.degree {
            gossip.degree = positive("gossip.degree", degree)?;
        }
        if let Some(pending) = section.max_pending_validations {
            gossip.max_pending_validations = positive("gossip.max_pending_validations", pending)?;
        }
        if let Some(auto_connect) = section.auto_connect {
            gossip.auto_connect = auto_connect;
        }

        Ok(NodeConfig {
            hostkey: file.hostkey.unwrap_or(defaults.hostkey),
            identities: file.identities.unwrap_or(defaults.identities),
            gossip,
            p2p_address: parse_address(
                "gossip.p2p_address",
                section.p2p_address.as_deref().unwrap_or(DEFAULT_P2P_ADDRESS),
            )?,
            api_address: parse_address(
                "gossip.api_address",
                section.api_address.as_deref().unwrap_or(DEFAULT_API_ADDRESS),
            )?,
        })
    }
}

/// Apply `GOSSIP_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut NodeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup("GOSSIP_P2P_ADDRESS") {
        config.p2p_address = parse_address("GOSSIP_P2P_ADDRESS", &value)?;
    }
    if let Some(value) = lookup("GOSSIP_API_ADDRESS") {
        config.api_address = parse_address("GOSSIP_API_ADDRESS", &value)?;
    }
    if let Some(value) = lookup("GOSSIP_DEGREE") {
        config.gossip.degree = parse_count("GOSSIP_DEGREE", &value)?;
    }
    if let Some(value) = lookup("GOSSIP_CACHE_SIZE") {
        config.gossip.cache_size = parse_count("GOSSIP_CACHE_SIZE", &value)?;
    }
    Ok(())
}

fn parse_address(key: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    let count = value.parse().map_err(|_| invalid(key, value))?;
    positive(key, count)
}

fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(invalid(key, "0"));
    }
    Ok(value)
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}
