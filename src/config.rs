// src/config.rs

//! Loads, resolves and validates the coordinator's configuration.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Per-database, per-shard quorum/policy defaults applied when a partition
/// isn't configured explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionDefaults {
    #[serde(default = "default_read_quorum")]
    pub read_quorum: usize,
    #[serde(default = "default_write_quorum")]
    pub write_quorum: usize,
    #[serde(default)]
    pub read_your_writes: bool,
    #[serde(default)]
    pub fail_when_available_less_than_quorum: bool,
    #[serde(default = "default_partition_strategy")]
    pub partition_strategy: String,
}

impl Default for PartitionDefaults {
    fn default() -> Self {
        Self {
            read_quorum: default_read_quorum(),
            write_quorum: default_write_quorum(),
            read_your_writes: false,
            fail_when_available_less_than_quorum: false,
            partition_strategy: default_partition_strategy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

/// Raw, directly-deserialized shape of the TOML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    node_name: String,
    #[serde(default)]
    databases: Vec<String>,
    #[serde(default = "default_distributed_queue_timeout_ms")]
    distributed_queue_timeout_ms: u64,
    #[serde(default = "default_resync_every_secs")]
    resync_every_secs: u64,
    #[serde(default)]
    partition_defaults: PartitionDefaults,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    metrics: MetricsConfig,
}

/// Resolved, validated coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_name: String,
    pub databases: Vec<String>,
    pub distributed_queue_timeout_ms: u64,
    pub resync_every_secs: u64,
    pub partition_defaults: PartitionDefaults,
    pub log_level: String,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Reads and parses a TOML config file, then validates the result.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at '{path}'"))?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(contents).with_context(|| "failed to parse coordinator config")?;

        let config = Config {
            node_name: raw.node_name,
            databases: raw.databases,
            distributed_queue_timeout_ms: raw.distributed_queue_timeout_ms,
            resync_every_secs: raw.resync_every_secs,
            partition_defaults: raw.partition_defaults,
            log_level: std::env::var("REPLICOORD_LOG").unwrap_or(raw.log_level),
            metrics: raw.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            return Err(anyhow!("node_name cannot be empty"));
        }
        if self.databases.is_empty() {
            return Err(anyhow!("databases cannot be empty"));
        }
        if self.distributed_queue_timeout_ms == 0 {
            return Err(anyhow!("distributed_queue_timeout_ms cannot be 0"));
        }
        if self.partition_defaults.write_quorum == 0 {
            return Err(anyhow!("partition_defaults.write_quorum cannot be 0"));
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(anyhow!("metrics.port cannot be 0 when metrics are enabled"));
        }
        Ok(())
    }

    pub fn distributed_queue_timeout(&self) -> Duration {
        Duration::from_millis(self.distributed_queue_timeout_ms)
    }

    pub fn resync_every(&self) -> Duration {
        Duration::from_secs(self.resync_every_secs)
    }
}

fn default_read_quorum() -> usize {
    1
}
fn default_write_quorum() -> usize {
    1
}
fn default_partition_strategy() -> String {
    "round-robin".to_string()
}
fn default_distributed_queue_timeout_ms() -> u64 {
    2_000
}
fn default_resync_every_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9100
}
