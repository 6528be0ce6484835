//! Configuration for the ledger

use crate::types::{Amount, TokenMetadata, DEFAULT_ISSUE_CAP};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Token metadata, fixed at genesis
    pub token: TokenMetadata,

    /// Genesis parameters
    pub genesis: GenesisConfig,

    /// Journal storage
    pub storage: StorageConfig,

    /// Actor mailbox
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "token-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            token: TokenMetadata::default(),
            genesis: GenesisConfig::default(),
            storage: StorageConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Genesis parameters, only read when no journal exists yet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Deploying identity: administrator, sole issuer and reserved owner
    pub deployer: String,

    /// Initial per-call issue cap (raw units)
    pub issue_cap: Amount,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            deployer: "deployer".to_string(),
            issue_cap: DEFAULT_ISSUE_CAP,
        }
    }
}

/// Journal storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist the journal; in-memory only when false
    pub enabled: bool,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// fsync every journal write
    pub sync_writes: bool,

    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_dir: PathBuf::from("./data/token-ledger"),
            sync_writes: true,
            write_buffer_size_mb: 64,
            max_background_jobs: 2,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox capacity (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("TOKEN_LEDGER_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
            config.storage.enabled = true;
        }

        if let Ok(persist) = std::env::var("TOKEN_LEDGER_PERSIST") {
            config.storage.enabled = matches!(persist.as_str(), "1" | "true" | "yes");
        }

        if let Ok(deployer) = std::env::var("TOKEN_LEDGER_DEPLOYER") {
            config.genesis.deployer = deployer;
        }

        if let Ok(cap) = std::env::var("TOKEN_LEDGER_ISSUE_CAP") {
            config.genesis.issue_cap = cap.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid TOKEN_LEDGER_ISSUE_CAP {:?}: {}", cap, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ledger cannot start from
    pub fn validate(&self) -> crate::Result<()> {
        if self.genesis.deployer.trim().is_empty() {
            return Err(crate::Error::Config("genesis.deployer must not be empty".to_string()));
        }
        if self.genesis.issue_cap == 0 {
            return Err(crate::Error::Config("genesis.issue_cap must be > 0".to_string()));
        }
        if self.token.decimals > 18 {
            return Err(crate::Error::Config(format!(
                "token.decimals {} out of range (max 18)",
                self.token.decimals
            )));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config("actor.mailbox_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}
