// src/core/partition.rs

//! Partition/shard membership and per-shard quorum policy.
//!
//! `PartitionTable` is the reference resolver backing the `PartitionDirectory`
//! contract: given a database (and optional shard) it answers the node-set
//! and quorum knobs the outbound dispatcher needs.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Immutable-per-snapshot quorum/membership policy for one (database, shard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub nodes: Vec<String>,
    pub read_quorum: usize,
    pub write_quorum: usize,
    pub read_your_writes: bool,
    pub fail_when_available_less_than_quorum: bool,
    pub partition_strategy: String,
}

impl PartitionConfig {
    pub fn new(nodes: Vec<String>) -> Self {
        Self {
            nodes,
            read_quorum: 1,
            write_quorum: 1,
            read_your_writes: false,
            fail_when_available_less_than_quorum: false,
            partition_strategy: "round-robin".to_string(),
        }
    }
}

/// Config contract §6: per-database, per-shard quorum/policy knobs plus
/// membership-churn mutators.
pub trait PartitionDirectory: Send + Sync {
    fn nodes_for(&self, database: &str, shard: Option<&str>) -> Vec<String>;
    fn read_quorum(&self, database: &str, shard: Option<&str>) -> usize;
    fn write_quorum(&self, database: &str, shard: Option<&str>) -> usize;
    fn partition_strategy(&self, database: &str, shard: Option<&str>) -> String;
    fn read_your_writes(&self, database: &str, shard: Option<&str>) -> bool;
    fn fail_when_available_less_than_quorum(&self, database: &str, shard: Option<&str>) -> bool;
    fn resync_every(&self) -> Duration;
    fn add_new_node_in_partitions(&self, node: &str);
    fn remove_node_in_partition(&self, node: &str, force: bool);
    fn serialize(&self) -> Vec<u8>;
}

fn key(database: &str, shard: Option<&str>) -> (String, String) {
    (database.to_string(), shard.unwrap_or("").to_string())
}

/// `DashMap`-backed membership/partition tracker.
pub struct PartitionTable {
    partitions: DashMap<(String, String), PartitionConfig>,
    resync_every: RwLock<Duration>,
}

impl PartitionTable {
    pub fn new(resync_every: Duration) -> Self {
        Self {
            partitions: DashMap::new(),
            resync_every: RwLock::new(resync_every),
        }
    }

    pub fn register(&self, database: &str, shard: Option<&str>, config: PartitionConfig) {
        self.partitions.insert(key(database, shard), config);
    }

    pub fn set_resync_every(&self, interval: Duration) {
        *self.resync_every.write() = interval;
    }

    /// Startup membership check: adds the local node to any partition that's
    /// missing it. Returns the databases whose configuration changed.
    pub fn check_local_in_configuration(&self, local_node: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for mut entry in self.partitions.iter_mut() {
            if !entry.nodes.iter().any(|n| n == local_node) {
                entry.nodes.push(local_node.to_string());
                touched.push(entry.key().0.clone());
            }
        }
        touched
    }
}

impl PartitionDirectory for PartitionTable {
    fn nodes_for(&self, database: &str, shard: Option<&str>) -> Vec<String> {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.nodes.clone())
            .unwrap_or_default()
    }

    fn read_quorum(&self, database: &str, shard: Option<&str>) -> usize {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.read_quorum)
            .unwrap_or(0)
    }

    fn write_quorum(&self, database: &str, shard: Option<&str>) -> usize {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.write_quorum)
            .unwrap_or(0)
    }

    fn partition_strategy(&self, database: &str, shard: Option<&str>) -> String {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.partition_strategy.clone())
            .unwrap_or_default()
    }

    fn read_your_writes(&self, database: &str, shard: Option<&str>) -> bool {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.read_your_writes)
            .unwrap_or(false)
    }

    fn fail_when_available_less_than_quorum(&self, database: &str, shard: Option<&str>) -> bool {
        self.partitions
            .get(&key(database, shard))
            .map(|c| c.fail_when_available_less_than_quorum)
            .unwrap_or(false)
    }

    fn resync_every(&self) -> Duration {
        *self.resync_every.read()
    }

    fn add_new_node_in_partitions(&self, node: &str) {
        for mut entry in self.partitions.iter_mut() {
            if !entry.nodes.iter().any(|n| n == node) {
                entry.nodes.push(node.to_string());
            }
        }
    }

    fn remove_node_in_partition(&self, node: &str, _force: bool) {
        for mut entry in self.partitions.iter_mut() {
            entry.nodes.retain(|n| n != node);
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let snapshot: BTreeMap<String, PartitionConfig> = self
            .partitions
            .iter()
            .map(|e| {
                let (db, shard) = e.key().clone();
                let label = if shard.is_empty() {
                    db
                } else {
                    format!("{db}/{shard}")
                };
                (label, e.value().clone())
            })
            .collect();
        serde_json::to_vec(&snapshot).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PartitionTable {
        let t = PartitionTable::new(Duration::from_secs(30));
        let mut cfg = PartitionConfig::new(vec!["n1".into(), "n2".into(), "n3".into()]);
        cfg.write_quorum = 2;
        cfg.read_quorum = 1;
        t.register("db", None, cfg);
        t
    }

    #[test]
    fn resolves_node_set_and_quorum() {
        let t = table();
        assert_eq!(t.nodes_for("db", None), vec!["n1", "n2", "n3"]);
        assert_eq!(t.write_quorum("db", None), 2);
    }

    #[test]
    fn unknown_partition_resolves_empty() {
        let t = table();
        assert!(t.nodes_for("missing", None).is_empty());
    }

    #[test]
    fn add_and_remove_node_touches_every_partition() {
        let t = table();
        t.add_new_node_in_partitions("n4");
        assert!(t.nodes_for("db", None).contains(&"n4".to_string()));
        t.remove_node_in_partition("n4", false);
        assert!(!t.nodes_for("db", None).contains(&"n4".to_string()));
    }

    #[test]
    fn check_local_in_configuration_adds_missing_local_node() {
        let t = table();
        let touched = t.check_local_in_configuration("n1");
        assert!(touched.is_empty());
        let touched = t.check_local_in_configuration("n5");
        assert_eq!(touched, vec!["db".to_string()]);
        assert!(t.nodes_for("db", None).contains(&"n5".to_string()));
    }
}
