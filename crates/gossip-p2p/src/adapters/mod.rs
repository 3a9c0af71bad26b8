//! # Adapters
//!
//! Implementations of the driven ports and the outer surfaces:
//!
//! - `storage` - identity files on disk, in-memory store for tests
//! - `config` - TOML configuration with environment overrides
//! - `api` - local module API over TCP

pub mod api;
pub mod config;
pub mod storage;

pub use api::{ApiConnection, ApiListener};
pub use config::{apply_env_overrides, ConfigError, NodeConfig, TomlConfigProvider};
pub use storage::{FilePeerIdentityStorage, InMemoryPeerIdentityStorage};
