//! `metaledger.toml` loading and the effective settings for one run.
//!
//! Store root precedence: `--store`, then `METALEDGER_HOME`, then
//! `store.root` from the config file, then `.metaledger`. The config file
//! is `--config` if given, else `{root}/metaledger.toml`, where `root` is
//! resolved without the file's own `store.root`. A missing file means
//! defaults; a malformed one is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use metaledger_engine::RetryPolicy;
use metaledger_storage::Network;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_STORE_ROOT: &str = ".metaledger";
pub(crate) const CONFIG_FILE_NAME: &str = "metaledger.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub store: StoreSection,
    pub probe: ProbeSection,
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProbeSection {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for ProbeSection {
    fn default() -> Self {
        ProbeSection {
            timeout_secs: 10,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl ProbeSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NetworkPreset {
    pub rpc_endpoint: String,
    pub ipfs_gateway: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct NetworkSection {
    pub testnet: NetworkPreset,
    pub mainnet: NetworkPreset,
}

impl Default for NetworkSection {
    fn default() -> Self {
        NetworkSection {
            testnet: NetworkPreset {
                rpc_endpoint: "http://159.203.17.36:8545".to_string(),
                ipfs_gateway: "http://159.203.17.36:8080/ipfs".to_string(),
            },
            mainnet: NetworkPreset {
                rpc_endpoint: "https://mainnet.metanode.network:8545".to_string(),
                ipfs_gateway: "https://ipfs.metanode.network".to_string(),
            },
        }
    }
}

impl NetworkSection {
    pub fn preset(&self, network: Network) -> &NetworkPreset {
        match network {
            Network::Testnet => &self.testnet,
            Network::Mainnet => &self.mainnet,
        }
    }
}

impl Config {
    /// Parse TOML text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<(Config, bool), ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok((Config::parse(&text, path)?, true)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Config::default(), false)),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            path: path.to_path_buf(),
            message: message.to_string(),
        };
        if self.probe.timeout_secs == 0 {
            return Err(invalid("probe.timeout_secs must be at least 1"));
        }
        if self.probe.max_attempts == 0 {
            return Err(invalid("probe.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Everything a command needs to know about where and how to run.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub store_root: PathBuf,
    pub config_path: PathBuf,
    /// Whether `config_path` existed and was read.
    pub config_loaded: bool,
    pub config: Config,
}

impl Settings {
    /// Resolve settings from flags and environment values.
    ///
    /// `env_rpc` replaces the testnet RPC endpoint when set.
    pub fn resolve(
        store_flag: Option<&Path>,
        config_flag: Option<&Path>,
        env_home: Option<String>,
        env_rpc: Option<String>,
    ) -> Result<Settings, ConfigError> {
        let env_home = env_home.filter(|h| !h.trim().is_empty()).map(PathBuf::from);
        let explicit_root = store_flag.map(Path::to_path_buf).or(env_home);

        let config_path = match config_flag {
            Some(path) => path.to_path_buf(),
            None => explicit_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT))
                .join(CONFIG_FILE_NAME),
        };
        let (mut config, config_loaded) = Config::load(&config_path)?;

        if let Some(rpc) = env_rpc.filter(|r| !r.trim().is_empty()) {
            config.network.testnet.rpc_endpoint = rpc;
        }

        let store_root = explicit_root
            .or_else(|| config.store.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));

        tracing::debug!(
            store_root = %store_root.display(),
            config_path = %config_path.display(),
            config_loaded,
            "settings resolved"
        );
        Ok(Settings {
            store_root,
            config_path,
            config_loaded,
            config,
        })
    }

    /// Settings from the real process environment.
    pub fn from_env(
        store_flag: Option<&Path>,
        config_flag: Option<&Path>,
    ) -> Result<Settings, ConfigError> {
        Settings::resolve(
            store_flag,
            config_flag,
            std::env::var("METALEDGER_HOME").ok(),
            std::env::var("METALEDGER_RPC_ENDPOINT").ok(),
        )
    }
}
