//! Domain types for the cluster snapshot.
//!
//! These types describe stores, regions, and replicas as reported by
//! heartbeats. All types are serializable so the admin API can accept
//! and return them as JSON.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique identifier for a storage node.
pub type StoreId = u64;

/// Unique identifier for a region (stable across heartbeats).
pub type RegionId = u64;

/// Unique identifier for a single replica of a region.
pub type ReplicaId = u64;

// ── Replica ───────────────────────────────────────────────────────

/// One copy of a region hosted on a specific store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replica {
    pub id: ReplicaId,
    pub store_id: StoreId,
}

impl Replica {
    pub fn new(id: ReplicaId, store_id: StoreId) -> Self {
        Self { id, store_id }
    }
}

/// A replica the cluster believes unreachable, with how long it has been down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownReplica {
    pub replica: Replica,
    pub down_seconds: u64,
}

// ── Region ────────────────────────────────────────────────────────

/// Version pair bumped by the storage layer on membership and key-range changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionEpoch {
    /// Bumped on every membership change.
    pub conf_ver: u64,
    /// Bumped on every split or merge.
    pub version: u64,
}

/// A contiguous, replicated partition of the keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub id: RegionId,
    #[serde(default)]
    pub start_key: Vec<u8>,
    #[serde(default)]
    pub end_key: Vec<u8>,
    #[serde(default)]
    pub epoch: RegionEpoch,
    /// Replica set, in the order the storage layer reports it.
    pub replicas: Vec<Replica>,
    /// The replica currently serving as raft leader.
    pub leader: Option<Replica>,
    /// Replicas whose membership change is proposed but not yet applied.
    #[serde(default)]
    pub pending_replicas: Vec<Replica>,
    /// Replicas reported unreachable by the leader.
    #[serde(default)]
    pub down_replicas: Vec<DownReplica>,
}

impl RegionInfo {
    /// Build a region with the given replicas and leader and an empty key range.
    pub fn new(id: RegionId, replicas: Vec<Replica>, leader: Option<Replica>) -> Self {
        Self {
            id,
            start_key: Vec::new(),
            end_key: Vec::new(),
            epoch: RegionEpoch::default(),
            replicas,
            leader,
            pending_replicas: Vec::new(),
            down_replicas: Vec::new(),
        }
    }

    /// Look up a replica by its ID.
    pub fn replica(&self, replica_id: ReplicaId) -> Option<&Replica> {
        self.replicas.iter().find(|r| r.id == replica_id)
    }

    /// Look up the replica hosted on `store_id`.
    pub fn store_replica(&self, store_id: StoreId) -> Option<&Replica> {
        self.replicas.iter().find(|r| r.store_id == store_id)
    }

    /// Store hosting the leader, if a leader is known.
    pub fn leader_store_id(&self) -> Option<StoreId> {
        self.leader.map(|l| l.store_id)
    }

    /// All replicas except the leader.
    pub fn followers(&self) -> impl Iterator<Item = &Replica> {
        let leader = self.leader_store_id();
        self.replicas
            .iter()
            .filter(move |r| Some(r.store_id) != leader)
    }

    /// IDs of every store hosting a replica of this region.
    pub fn store_ids(&self) -> HashSet<StoreId> {
        self.replicas.iter().map(|r| r.store_id).collect()
    }

    pub fn is_pending(&self, replica_id: ReplicaId) -> bool {
        self.pending_replicas.iter().any(|r| r.id == replica_id)
    }

    pub fn is_down(&self, replica_id: ReplicaId) -> bool {
        self.down_replicas.iter().any(|d| d.replica.id == replica_id)
    }

    /// A replica that is neither pending nor down.
    pub fn is_replica_healthy(&self, replica_id: ReplicaId) -> bool {
        !self.is_pending(replica_id) && !self.is_down(replica_id)
    }

    /// True when no replica is pending or down.
    pub fn is_healthy(&self) -> bool {
        self.pending_replicas.is_empty() && self.down_replicas.is_empty()
    }
}

// ── Store ─────────────────────────────────────────────────────────

/// Load figures a store reports on every heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of region leaders hosted on the store.
    pub leader_count: u64,
    /// Total number of replicas hosted on the store.
    pub region_count: u64,
    /// Fraction of storage capacity in use (0.0–1.0).
    pub used_ratio: f64,
}

/// Liveness of a store as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StoreState {
    Up,
    /// Down since the given unix timestamp (seconds).
    Down { since: u64 },
}

/// A storage node and its latest reported stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: StoreId,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub stats: StoreStats,
    pub state: StoreState,
    /// Unix timestamp of the last heartbeat.
    #[serde(default)]
    pub last_heartbeat: u64,
}

impl StoreInfo {
    /// A freshly registered, live store with zeroed stats.
    pub fn new(id: StoreId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            stats: StoreStats::default(),
            state: StoreState::Up,
            last_heartbeat: epoch_secs(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == StoreState::Up
    }

    /// How long the store has been down; zero while it is up.
    pub fn down_time(&self) -> Duration {
        match self.state {
            StoreState::Up => Duration::ZERO,
            StoreState::Down { since } => {
                Duration::from_secs(epoch_secs().saturating_sub(since))
            }
        }
    }
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionInfo {
        let leader = Replica::new(11, 1);
        let mut region = RegionInfo::new(
            1,
            vec![leader, Replica::new(12, 2), Replica::new(13, 3)],
            Some(leader),
        );
        region.pending_replicas.push(Replica::new(13, 3));
        region
    }

    #[test]
    fn followers_exclude_leader() {
        let region = region();
        let stores: Vec<_> = region.followers().map(|r| r.store_id).collect();
        assert_eq!(stores, vec![2, 3]);
    }

    #[test]
    fn replica_lookup_by_store_and_id() {
        let region = region();
        assert_eq!(region.store_replica(2).map(|r| r.id), Some(12));
        assert_eq!(region.replica(13).map(|r| r.store_id), Some(3));
        assert!(region.store_replica(9).is_none());
        assert_eq!(region.store_ids(), HashSet::from([1, 2, 3]));
    }

    #[test]
    fn pending_replica_is_unhealthy() {
        let mut region = region();
        assert!(!region.is_healthy());
        assert!(!region.is_replica_healthy(13));
        assert!(region.is_replica_healthy(12));

        region.pending_replicas.clear();
        region.down_replicas.push(DownReplica {
            replica: Replica::new(12, 2),
            down_seconds: 60,
        });
        assert!(region.is_down(12));
        assert!(!region.is_healthy());
    }

    #[test]
    fn down_time_is_zero_while_up() {
        let mut store = StoreInfo::new(1, "127.0.0.1:20160");
        assert!(store.is_up());
        assert_eq!(store.down_time(), Duration::ZERO);

        store.state = StoreState::Down {
            since: epoch_secs() - 120,
        };
        assert!(!store.is_up());
        assert!(store.down_time() >= Duration::from_secs(120));
    }

    #[test]
    fn region_deserializes_with_defaults() {
        let json = r#"{
            "id": 7,
            "replicas": [{"id": 1, "store_id": 1}],
            "leader": {"id": 1, "store_id": 1}
        }"#;
        let region: RegionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(region.id, 7);
        assert!(region.pending_replicas.is_empty());
        assert_eq!(region.epoch, RegionEpoch::default());
    }
}
