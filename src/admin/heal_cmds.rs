use derivative::Derivative;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_repr::Serialize_repr;

use crate::utils;

/// Type of healing scan.
#[derive(Serialize_repr, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Derivative)]
#[derivative(Default)]
#[serde(from = "u8")]
#[repr(u8)]
pub enum HealScanMode {
    #[derivative(Default)]
    Unknown = 0,
    // Checks if parts are present and not outdated.
    Normal = 1,
    // Checks for parts bitrot checksums.
    Deep = 2,
}

// Modes added by newer servers are treated as unknown.
impl From<u8> for HealScanMode {
    fn from(mode: u8) -> Self {
        match mode {
            1 => HealScanMode::Normal,
            2 => HealScanMode::Deep,
            _ => HealScanMode::Unknown,
        }
    }
}

/// Options of a heal sequence.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct HealOpts {
    pub recursive: bool,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
    pub remove: bool,
    // Only used when a bucket needs to be healed.
    pub recreate: bool,
    #[serde(rename = "scanMode")]
    pub scan_mode: HealScanMode,
    #[serde(rename = "nolock")]
    pub no_lock: bool,
}

// `recreate` and `no_lock` are operational knobs, two sequences differing
// only in them heal the same way.
impl PartialEq for HealOpts {
    fn eq(&self, other: &Self) -> bool {
        self.recursive == other.recursive
            && self.dry_run == other.dry_run
            && self.remove == other.remove
            && self.scan_mode == other.scan_mode
    }
}

impl Eq for HealOpts {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Derivative)]
#[derivative(Default)]
pub struct HealStartSuccess {
    // Required, a payload without a token is not a start/stop response.
    #[serde(rename = "clientToken")]
    pub client_token: String,
    #[serde(rename = "clientAddress", default)]
    pub client_address: String,
    #[serde(rename = "startTime", default = "utils::epoch")]
    #[derivative(Default(value = "utils::epoch()"))]
    pub start_time: utils::DateTime,
}

/// Returned by a force-stop, describes the heal sequence that was stopped.
pub type HealStopSuccess = HealStartSuccess;

#[derive(Serialize, Deserialize, Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct HealTaskStatus {
    pub summary: String,
    #[serde(rename = "detail", default)]
    pub failure_detail: String,
    #[serde(rename = "startTime", default = "utils::epoch")]
    #[derivative(Default(value = "utils::epoch()"))]
    pub start_time: utils::DateTime,
    #[serde(rename = "settings", default)]
    pub heal_settings: HealOpts,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        default,
        deserialize_with = "utils::null_default"
    )]
    pub items: Vec<HealResultItem>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Derivative)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub enum HealItemType {
    Metadata,
    Bucket,
    BucketMetadata,
    #[derivative(Default)]
    Object,
    // Item types this side does not know yet.
    #[serde(other)]
    Unknown,
}

/// Health of a single drive as observed by a heal.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Derivative,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr
)]
#[derivative(Default)]
#[serde(from = "String", into = "&'static str")]
#[strum(serialize_all = "kebab-case")]
pub enum DriveState {
    Ok,
    Offline,
    Corrupt,
    Missing,
    #[strum(serialize = "permission-denied")]
    Permission,
    Faulty,
    #[derivative(Default)]
    Unknown,
    // Only ever reported by the disk itself.
    Unformatted,
}

// Newer peers may report states this side does not know yet.
impl From<String> for DriveState {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(DriveState::Unknown)
    }
}

impl DriveState {
    pub fn is_ok(self) -> bool {
        self == DriveState::Ok
    }

    pub fn is_offline(self) -> bool {
        self == DriveState::Offline
    }

    pub fn is_corrupt(self) -> bool {
        self == DriveState::Corrupt
    }

    pub fn is_missing(self) -> bool {
        self == DriveState::Missing
    }

    pub fn is_permission_denied(self) -> bool {
        self == DriveState::Permission
    }

    pub fn is_faulty(self) -> bool {
        self == DriveState::Faulty
    }

    pub fn is_unknown(self) -> bool {
        self == DriveState::Unknown
    }

    pub fn is_unformatted(self) -> bool {
        self == DriveState::Unformatted
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HealDriveInfo {
    pub uuid: String,
    pub endpoint: String,
    pub state: DriveState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HealDrives {
    #[serde(deserialize_with = "utils::null_default")]
    pub drives: Vec<HealDriveInfo>,
}

/// Outcome of healing one object, bucket or metadata entry.
///
/// `before` and `after` list the same drives in the same order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HealResultItem {
    #[serde(rename = "resultId")]
    pub result_index: i64,
    #[serde(rename = "type")]
    pub heal_item_type: HealItemType,
    pub bucket: String,
    pub object: String,
    #[serde(rename = "versionId")]
    pub version_id: String,
    pub detail: String,
    #[serde(rename = "parityBlocks", skip_serializing_if = "is_zero")]
    pub parity_blocks: usize,
    #[serde(rename = "dataBlocks", skip_serializing_if = "is_zero")]
    pub data_blocks: usize,
    #[serde(rename = "diskCount")]
    pub disk_count: usize,
    #[serde(rename = "setCount")]
    pub set_count: usize,
    pub before: HealDrives,
    pub after: HealDrives,
    #[serde(rename = "objectSize")]
    pub object_size: i64,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl HealResultItem {
    pub fn missing_counts(&self) -> (usize, usize) {
        count_drives(Some(self), DriveState::Missing)
    }

    pub fn offline_counts(&self) -> (usize, usize) {
        count_drives(Some(self), DriveState::Offline)
    }

    pub fn corrupted_counts(&self) -> (usize, usize) {
        count_drives(Some(self), DriveState::Corrupt)
    }

    pub fn online_counts(&self) -> (usize, usize) {
        count_drives(Some(self), DriveState::Ok)
    }

    /// Returns whether `before` and `after` describe the same drives:
    /// equal lengths, and equal uuids wherever both sides report one.
    pub fn is_aligned(&self) -> bool {
        let (before, after) = (&self.before.drives, &self.after.drives);
        before.len() == after.len()
            && before
                .iter()
                .zip(after)
                .all(|(b, a)| b.uuid.is_empty() || a.uuid.is_empty() || b.uuid == a.uuid)
    }

    /// Pairs every drive with its state after the heal, `None` if the two
    /// lists are not aligned.
    pub fn drive_transitions(&self) -> Option<Vec<(&HealDriveInfo, &HealDriveInfo)>> {
        if !self.is_aligned() {
            warn!(
                "heal result {} for {}/{} has misaligned drive lists ({} before, {} after)",
                self.result_index,
                self.bucket,
                self.object,
                self.before.drives.len(),
                self.after.drives.len()
            );
            return None;
        }
        Some(
            self.before
                .drives
                .iter()
                .zip(&self.after.drives)
                .collect(),
        )
    }
}

/// Counts drives in `state` before and after the heal. An absent result
/// counts nothing.
pub fn count_drives(item: Option<&HealResultItem>, state: DriveState) -> (usize, usize) {
    let item = match item {
        Some(item) => item,
        None => return (0, 0),
    };
    let count = |drives: &[HealDriveInfo]| drives.iter().filter(|d| d.state == state).count();
    (count(&item.before.drives), count(&item.after.drives))
}

pub fn missing_counts(item: Option<&HealResultItem>) -> (usize, usize) {
    count_drives(item, DriveState::Missing)
}

pub fn offline_counts(item: Option<&HealResultItem>) -> (usize, usize) {
    count_drives(item, DriveState::Offline)
}

pub fn corrupted_counts(item: Option<&HealResultItem>) -> (usize, usize) {
    count_drives(item, DriveState::Corrupt)
}

pub fn online_counts(item: Option<&HealResultItem>) -> (usize, usize) {
    count_drives(item, DriveState::Ok)
}
