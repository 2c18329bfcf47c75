use std::collections::HashMap;

use derivative::Derivative;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::utils;

/// MRF (most recently failed) heal metrics of one server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Derivative)]
#[derivative(Default)]
pub struct MRFStatus {
    #[serde(default)]
    pub bytes_healed: u64,
    #[serde(default)]
    pub items_healed: u64,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default = "utils::epoch")]
    #[derivative(Default(value = "utils::epoch()"))]
    pub started: utils::DateTime,
}

/// Progress of a disk going through background healing. Counters only grow
/// for the lifetime of one healing run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct HealingDisk {
    pub id: String,
    pub pool_index: i32,
    pub set_index: i32,
    pub disk_index: i32,
    pub endpoint: String,
    pub path: String,
    #[derivative(Default(value = "utils::epoch()"))]
    pub started: utils::DateTime,
    #[derivative(Default(value = "utils::epoch()"))]
    pub last_update: utils::DateTime,

    pub objects_total_count: u64,
    pub objects_total_size: u64,

    pub items_healed: u64,
    pub items_failed: u64,
    pub bytes_done: u64,
    pub bytes_failed: u64,

    // Superseded by items_healed/items_failed, still sent by older servers.
    pub objects_healed: u64,
    pub objects_failed: u64,

    // Last object scanned.
    #[serde(rename = "current_bucket")]
    pub bucket: String,
    #[serde(rename = "current_object")]
    pub object: String,

    // Filled on startup/restarts.
    #[serde(deserialize_with = "utils::null_default")]
    pub queued_buckets: Vec<String>,
    // Filled during heal.
    #[serde(deserialize_with = "utils::null_default")]
    pub healed_buckets: Vec<String>,
}

impl HealingDisk {
    /// Share of the known objects already visited, in percent.
    pub fn percent_done(&self) -> f64 {
        if self.objects_total_count == 0 {
            return 0.0;
        }
        let visited = self.items_healed.saturating_add(self.items_failed);
        (visited as f64 * 100.0 / self.objects_total_count as f64).min(100.0)
    }

    /// Returns whether this snapshot shows more work done than `prev`, a
    /// snapshot of the same healing run taken earlier.
    pub fn has_progressed_since(&self, prev: &HealingDisk) -> bool {
        let items = |d: &HealingDisk| d.items_healed.saturating_add(d.items_failed);
        let bytes = |d: &HealingDisk| d.bytes_done.saturating_add(d.bytes_failed);
        self.last_update > prev.last_update
            && (items(self) > items(prev)
                || bytes(self) > bytes(prev)
                || self.healed_buckets.len() > prev.healed_buckets.len())
    }
}

/// A drive of an erasure set as reported by one node.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Disk {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    #[serde(rename = "path", skip_serializing_if = "String::is_empty")]
    pub drive_path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub healing: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(rename = "totalspace", skip_serializing_if = "is_zero")]
    pub total_space: u64,
    #[serde(rename = "usedspace", skip_serializing_if = "is_zero")]
    pub used_space: u64,
    #[serde(rename = "availspace", skip_serializing_if = "is_zero")]
    pub available_space: u64,
    // Owned by the healing process of this disk, absent when not healing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal_info: Option<HealingDisk>,
    pub pool_index: i32,
    pub set_index: i32,
    pub disk_index: i32,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Heal status of one erasure set; `id` identifies the set across nodes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SetStatus {
    pub id: String,
    pub pool_index: i32,
    pub set_index: i32,
    pub heal_status: String,
    pub heal_priority: String,
    pub total_objects: u64,
    #[serde(deserialize_with = "utils::null_default")]
    pub disks: Vec<Disk>,
}

/// Background heal status of a server, or of the whole cluster once the
/// reports of all servers are merged.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BgHealState {
    // Endpoints that could not report a background heal state.
    #[serde(rename = "offline_nodes", deserialize_with = "utils::null_default")]
    pub offline_endpoints: Vec<String>,
    // Total items scanned by the continuous background healing.
    #[serde(rename = "ScannedItemsCount")]
    pub scanned_items_count: i64,
    // Disks currently in heal states.
    #[serde(rename = "HealDisks", deserialize_with = "utils::null_default")]
    pub heal_disks: Vec<String>,
    #[serde(deserialize_with = "utils::null_default")]
    pub sets: Vec<SetStatus>,
    // Endpoint -> MRF status
    #[serde(deserialize_with = "utils::null_default")]
    pub mrf: HashMap<String, MRFStatus>,
    // Parity per storage class
    #[serde(rename = "sc_parity", deserialize_with = "utils::null_default")]
    pub sc_parity: HashMap<String, usize>,
}

impl BgHealState {
    /// Folds `others` into `self`, in order.
    ///
    /// Sets are matched by id: a report enumerating more disks replaces the
    /// known disk list, a report with as many disks only contributes the
    /// heal progress of its healing disks. While `self` has no sets at all,
    /// the next contributor's sets are taken as they are.
    ///
    /// Offline endpoints are appended as reported, so merging the same
    /// report twice lists them twice.
    pub fn merge(&mut self, others: &[BgHealState]) {
        // Parity is configured cluster wide, any node knows it.
        if self.sc_parity.is_empty() {
            if let Some(first) = others.first() {
                self.sc_parity = first.sc_parity.clone();
            }
        }

        for other in others {
            self.offline_endpoints
                .extend(other.offline_endpoints.iter().cloned());
            self.heal_disks.extend(other.heal_disks.iter().cloned());
            for (endpoint, status) in &other.mrf {
                self.mrf.insert(endpoint.clone(), status.clone());
            }
            self.scanned_items_count = self
                .scanned_items_count
                .saturating_add(other.scanned_items_count);

            if self.sets.is_empty() {
                self.sets = other.sets.clone();
                continue;
            }
            for set in &other.sets {
                self.add_set(set);
            }
        }

        self.sets
            .sort_by(|a, b| (a.pool_index, a.set_index).cmp(&(b.pool_index, b.set_index)));
    }

    fn add_set(&mut self, set: &SetStatus) {
        let existing = match self.sets.iter().position(|s| s.id == set.id) {
            Some(i) => &mut self.sets[i],
            None => {
                self.sets.push(set.clone());
                return;
            }
        };

        if existing.disks.len() < set.disks.len() {
            existing.disks = set.disks.clone();
            return;
        }
        if existing.disks.len() > set.disks.len() {
            debug!(
                "ignoring partial report of set {}: {} disks known, {} reported",
                set.id,
                existing.disks.len(),
                set.disks.len()
            );
            return;
        }
        for (disk, incoming) in existing.disks.iter_mut().zip(&set.disks) {
            if incoming.heal_info.is_some() {
                disk.heal_info = incoming.heal_info.clone();
            }
        }
    }

    pub fn set(&self, id: &str) -> Option<&SetStatus> {
        self.sets.iter().find(|s| s.id == id)
    }
}
