//! Runtime configuration for tier-cascade.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! The tier list, expiration defaults and per-type overrides live here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backends::{DiskBackend, InMemoryBackend};
use crate::cascade::{
    CacheItem, Capability, Chain, ExpirationMode, ExpirationPolicy, Tier,
};
use crate::cascade::keys::ItemKeyFn;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "tier-cascade", about = "Cascading multi-tier storage server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Expiration defaults and per-type overrides.
    pub expiration: ExpirationConfig,

    /// Tiers, fastest first.
    pub tiers: Vec<TierSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            expiration: ExpirationConfig::default(),
            tiers: vec![
                TierSpec {
                    ttl_secs: Some(60),
                    ..TierSpec::new("local", BackendSpec::Memory)
                },
                TierSpec::new(
                    "durable",
                    BackendSpec::Disk {
                        path: PathBuf::from("/tmp/tier-cascade"),
                        zstd_level: None,
                    },
                ),
            ],
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Field of a JSON document used as its key inside collections.
    pub document_key_field: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            document_key_field: "id".to_string(),
        }
    }
}

/// Expiration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    /// Default time-to-live in seconds (`null` = never expire).
    pub default_ttl_secs: Option<u64>,

    /// Default expiration mode.
    pub default_mode: ExpirationMode,

    /// Overrides keyed by item type name.
    pub overrides: HashMap<String, ExpirationOverride>,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: Some(300),
            default_mode: ExpirationMode::Absolute,
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationOverride {
    pub ttl_secs: Option<u64>,
    pub mode: Option<ExpirationMode>,
}

impl ExpirationConfig {
    /// Policy for items of `type_name`: the type's override where present,
    /// the defaults otherwise.
    pub fn policy_for(&self, type_name: &str) -> ExpirationPolicy {
        let over = self.overrides.get(type_name).cloned().unwrap_or_default();
        ExpirationPolicy {
            ttl: over
                .ttl_secs
                .or(self.default_ttl_secs)
                .map(Duration::from_secs),
            absolute: None,
            mode: over.mode.unwrap_or(self.default_mode),
        }
    }
}

/// Which backend a tier uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSpec {
    Memory,
    Disk {
        path: PathBuf,
        #[serde(default)]
        zstd_level: Option<i32>,
    },
}

/// One tier of the configured chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,

    pub backend: BackendSpec,

    /// Tier-specific TTL, overriding the type policy.
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Tier-specific expiration mode, overriding the type policy.
    #[serde(default)]
    pub mode: Option<ExpirationMode>,

    /// Capabilities declared on top of the backend's own.
    #[serde(default)]
    pub capabilities: Vec<Capability>,

    #[serde(default)]
    pub all_key: Option<String>,

    #[serde(default)]
    pub list_key_prefix: Option<String>,

    #[serde(default)]
    pub list_key: Option<String>,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, backend: BackendSpec) -> Self {
        Self {
            name: name.into(),
            backend,
            ttl_secs: None,
            mode: None,
            capabilities: Vec::new(),
            all_key: None,
            list_key_prefix: None,
            list_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Expiration policy for one tier storing items of type `T`.
    pub fn tier_policy<T: CacheItem>(&self, spec: &TierSpec) -> ExpirationPolicy {
        let mut policy = self.expiration.policy_for(T::TYPE_NAME);
        if let Some(ttl) = spec.ttl_secs {
            policy.ttl = Some(Duration::from_secs(ttl));
        }
        if let Some(mode) = spec.mode {
            policy.mode = mode;
        }
        policy
    }

    /// Open every configured backend and assemble the chain.
    pub async fn build_chain<T>(&self, item_key: Option<ItemKeyFn<T>>) -> anyhow::Result<Chain<String, T>>
    where
        T: CacheItem + Serialize + DeserializeOwned,
    {
        let mut builder = Chain::builder();

        for spec in &self.tiers {
            let mut tier: Tier<String, T> = match &spec.backend {
                BackendSpec::Memory => Tier::new(spec.name.clone(), InMemoryBackend::<T>::new()),
                BackendSpec::Disk { path, zstd_level } => {
                    let mut disk = DiskBackend::new(path.clone()).await?;
                    if let Some(level) = zstd_level {
                        disk = disk.with_zstd(*level);
                    }
                    Tier::new(spec.name.clone(), disk)
                }
            };

            tier = tier.with_expiration(self.tier_policy::<T>(spec));
            for capability in &spec.capabilities {
                tier = tier.with_capability(*capability);
            }
            if let Some(key) = &spec.all_key {
                tier = tier.with_all_key(key.clone());
            }
            if let Some(prefix) = &spec.list_key_prefix {
                tier = tier.with_list_key_prefix(prefix.clone());
            }
            if let Some(key) = &spec.list_key {
                tier = tier.with_list_key(key.clone());
            }
            if let Some(f) = &item_key {
                let f = f.clone();
                tier = tier.with_item_key_fn(move |item| f(item));
            }

            builder = builder.tier(tier);
        }

        Ok(builder.build()?)
    }
}
