use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vouch_types::proof::deserialize_lenient;
use vouch_types::{DraftFields, ProofPayload};

/// Slot prefix for per-listing drafts. Shared with the cookie tier.
pub const DRAFT_KEY_PREFIX: &str = "draft_review_";
pub const DEVICE_ID_KEY: &str = "review_device_id";
pub const LARGE_OBJECT_PREFIX: &str = "large_data_";
/// Parked proofs older than this are swept on app load.
pub const LARGE_OBJECT_RETENTION_DAYS: i64 = 7;
/// Per-value ceiling, in the range browsers enforce for origin storage.
pub const MAX_LOCAL_VALUE_LEN: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("value for '{key}' is {len} bytes, limit is {limit}")]
    QuotaExceeded { key: String, len: usize, limit: usize },
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Synchronous, origin-scoped key-value storage (the browser's localStorage).
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-process storage with a per-value size limit.
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    max_value_len: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_limit(MAX_LOCAL_VALUE_LEN)
    }

    pub fn with_limit(max_value_len: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_value_len,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.len() > self.max_value_len {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                len: value.len(),
                limit: self.max_value_len,
            });
        }
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// A draft as held by the browser and cookie tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredDraftRecord")]
pub struct StoredDraft {
    pub listing_id: String,
    pub device_id: String,
    pub rating: Option<u8>,
    pub body_text: Option<String>,
    pub experience_date: Option<NaiveDate>,
    pub proof: Option<ProofPayload>,
    pub saved_at: DateTime<Utc>,
}

/// Read-side shape. Accepts records written by older clients: camelCase
/// keys, untyped `proofPayload` strings and a bare `largeDataId` pointer.
#[derive(Deserialize)]
struct StoredDraftRecord {
    #[serde(alias = "listingId")]
    listing_id: String,
    #[serde(alias = "deviceId", default)]
    device_id: String,
    #[serde(default)]
    rating: Option<u8>,
    #[serde(alias = "bodyText", alias = "comment", default)]
    body_text: Option<String>,
    #[serde(alias = "experienceDate", default)]
    experience_date: Option<NaiveDate>,
    #[serde(alias = "proofPayload", default, deserialize_with = "deserialize_lenient")]
    proof: Option<ProofPayload>,
    #[serde(alias = "largeDataId", default)]
    large_data_id: Option<String>,
    #[serde(alias = "timestamp", default = "Utc::now", deserialize_with = "deserialize_saved_at")]
    saved_at: DateTime<Utc>,
}

/// RFC 3339, or the integer epoch milliseconds older records carry.
fn deserialize_saved_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SavedAt {
        Rfc3339(DateTime<Utc>),
        Millis(i64),
    }

    match SavedAt::deserialize(deserializer)? {
        SavedAt::Rfc3339(at) => Ok(at),
        SavedAt::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {} is out of range", ms))),
    }
}

impl From<StoredDraftRecord> for StoredDraft {
    fn from(record: StoredDraftRecord) -> Self {
        let proof = match (record.proof, record.large_data_id) {
            (None, Some(object_key)) => Some(ProofPayload::Pointer { object_key }),
            (proof, _) => proof,
        };
        Self {
            listing_id: record.listing_id,
            device_id: record.device_id,
            rating: record.rating,
            body_text: record.body_text,
            experience_date: record.experience_date,
            proof,
            saved_at: record.saved_at,
        }
    }
}

impl StoredDraft {
    pub fn fields(&self) -> DraftFields {
        DraftFields {
            rating: self.rating,
            body_text: self.body_text.clone(),
            experience_date: self.experience_date,
            proof: self.proof.clone(),
        }
    }

    /// Key of the parked proof, when the proof was evicted from a cookie.
    pub fn large_data_id(&self) -> Option<&str> {
        match &self.proof {
            Some(ProofPayload::Pointer { object_key }) => Some(object_key),
            _ => None,
        }
    }

    pub fn has_large_proof(&self) -> bool {
        self.large_data_id().is_some()
    }
}

pub fn draft_key(listing_id: &str) -> String {
    format!("{}{}", DRAFT_KEY_PREFIX, listing_id)
}

/// Browser-tier draft store. Reads fail open: anything unreadable is "no draft".
#[derive(Clone)]
pub struct LocalDraftStore {
    storage: Arc<dyn LocalStorage>,
}

impl LocalDraftStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Stable anonymous identity for this browser profile, generated on first use.
    pub fn device_id(&self) -> String {
        if let Ok(Some(id)) = self.storage.get(DEVICE_ID_KEY) {
            if !id.is_empty() {
                return id;
            }
        }

        let id = format!("device_{}", Uuid::new_v4().simple());
        if let Err(e) = self.storage.set(DEVICE_ID_KEY, &id) {
            warn!("Failed to cache device id: {}", e);
        }
        id
    }

    /// Overwrite the slot for `listing_id` (last write wins).
    pub fn save_local(&self, listing_id: &str, fields: DraftFields) -> Result<StoredDraft, StorageError> {
        let draft = StoredDraft {
            listing_id: listing_id.to_string(),
            device_id: self.device_id(),
            rating: fields.rating,
            body_text: fields.body_text,
            experience_date: fields.experience_date,
            proof: fields.proof,
            saved_at: Utc::now(),
        };

        let json = serde_json::to_string(&draft).map_err(|e| StorageError::Io(e.to_string()))?;
        self.storage.set(&draft_key(listing_id), &json)?;
        Ok(draft)
    }

    pub fn read_local(&self, listing_id: &str) -> Option<StoredDraft> {
        let key = draft_key(listing_id);
        let raw = match self.storage.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Local draft read failed for {}: {}", listing_id, e);
                return None;
            }
        };

        match serde_json::from_str::<StoredDraft>(&raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!("Unreadable local draft for {}, ignoring: {}", listing_id, e);
                None
            }
        }
    }

    pub fn discard_local(&self, listing_id: &str) {
        if let Err(e) = self.storage.remove(&draft_key(listing_id)) {
            warn!("Failed to discard local draft for {}: {}", listing_id, e);
        }
    }

    /// Listing ids that currently have a browser-tier slot.
    pub fn local_draft_ids(&self) -> Vec<String> {
        match self.storage.keys() {
            Ok(keys) => keys
                .iter()
                .filter_map(|k| k.strip_prefix(DRAFT_KEY_PREFIX))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!("Failed to enumerate local drafts: {}", e);
                Vec::new()
            }
        }
    }

    // -- Large objects --

    /// Park a proof under a fresh `large_data_<ts>_<rand>` key and return the key.
    pub fn put_large_object(&self, proof: &ProofPayload, now: DateTime<Utc>) -> Result<String, StorageError> {
        let key = large_object_key(now);
        let json = serde_json::to_string(proof).map_err(|e| StorageError::Io(e.to_string()))?;
        self.storage.set(&key, &json)?;
        Ok(key)
    }

    pub fn get_large_object(&self, key: &str) -> Option<ProofPayload> {
        let raw = self.storage.get(key).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(proof) => Some(proof),
            // parked by an older client as a bare data URI
            Err(_) if !raw.trim().is_empty() => Some(ProofPayload::repair_legacy(&raw)),
            Err(_) => None,
        }
    }

    pub fn remove_large_object(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!("Failed to remove large object {}: {}", key, e);
        }
    }

    /// Remove parked proofs whose key timestamp is older than the retention
    /// window, whether or not a cookie still points at them.
    pub fn sweep_large_objects(&self, now: DateTime<Utc>) -> usize {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Large object sweep skipped: {}", e);
                return 0;
            }
        };

        let cutoff = now - Duration::days(LARGE_OBJECT_RETENTION_DAYS);
        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(LARGE_OBJECT_PREFIX)) {
            match large_object_created_at(key) {
                Some(created) if created < cutoff => {
                    self.remove_large_object(key);
                    removed += 1;
                }
                Some(_) => {}
                None => debug!("Large object key without timestamp: {}", key),
            }
        }

        if removed > 0 {
            info!("Swept {} expired large objects from local storage", removed);
        }
        removed
    }
}

fn large_object_key(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}_{}", LARGE_OBJECT_PREFIX, now.timestamp_millis(), suffix)
}

fn large_object_created_at(key: &str) -> Option<DateTime<Utc>> {
    let rest = key.strip_prefix(LARGE_OBJECT_PREFIX)?;
    let (millis, _) = rest.split_once('_')?;
    DateTime::from_timestamp_millis(millis.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<MemoryStorage>, LocalDraftStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), LocalDraftStore::new(storage))
    }

    fn fields() -> DraftFields {
        DraftFields {
            rating: Some(4),
            body_text: Some("Good service".into()),
            experience_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            proof: None,
        }
    }

    #[test]
    fn save_then_read_round_trips() {
        let (_, local) = store();
        let saved = local.save_local("L1", fields()).unwrap();
        let read = local.read_local(&saved.listing_id).unwrap();

        assert_eq!(read.rating, Some(4));
        assert_eq!(read.body_text.as_deref(), Some("Good service"));
        assert_eq!(read.experience_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(read.device_id.starts_with("device_"));
        assert_eq!(read, saved);
    }

    #[test]
    fn device_id_is_generated_once() {
        let (_, local) = store();
        let first = local.device_id();
        assert_eq!(local.device_id(), first);
        let draft = local.save_local("L1", fields()).unwrap();
        assert_eq!(draft.device_id, first);
    }

    #[test]
    fn corrupt_slot_reads_as_absent() {
        let (storage, local) = store();
        storage.set(&draft_key("L1"), "{not json").unwrap();
        assert!(local.read_local("L1").is_none());
    }

    #[test]
    fn legacy_record_is_repaired_on_read() {
        let (storage, local) = store();
        storage
            .set(
                &draft_key("L9"),
                r#"{"listingId":"L9","rating":5,"bodyText":"ok","proofPayload":"iVBORw0KGgoAAAANSUhEUgAA"}"#,
            )
            .unwrap();

        let draft = local.read_local("L9").unwrap();
        match draft.proof {
            Some(ProofPayload::Inline { mime_type, .. }) => assert_eq!(mime_type, "image/png"),
            other => panic!("unexpected proof {:?}", other),
        }
    }

    #[test]
    fn legacy_large_data_id_becomes_pointer() {
        let raw = r#"{"listingId":"L2","hasLargeProof":true,"largeDataId":"large_data_1700000000000_abcdefghi"}"#;
        let draft: StoredDraft = serde_json::from_str(raw).unwrap();

        assert_eq!(draft.large_data_id(), Some("large_data_1700000000000_abcdefghi"));
        assert!(draft.has_large_proof());
    }

    #[test]
    fn epoch_millis_timestamp_is_accepted() {
        let raw = r#"{"listingId":"L3","rating":2,"timestamp":1700000000123}"#;
        let draft: StoredDraft = serde_json::from_str(raw).unwrap();
        assert_eq!(draft.saved_at.timestamp_millis(), 1_700_000_000_123);

        let raw = r#"{"listingId":"L3","timestamp":"2024-03-01T10:00:00Z"}"#;
        let draft: StoredDraft = serde_json::from_str(raw).unwrap();
        assert_eq!(draft.saved_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let raw = r#"{"listingId":"L3","timestamp":"yesterday"}"#;
        assert!(serde_json::from_str::<StoredDraft>(raw).is_err());
    }

    #[test]
    fn discard_removes_slot() {
        let (_, local) = store();
        local.save_local("L1", fields()).unwrap();
        assert_eq!(local.local_draft_ids(), vec!["L1".to_string()]);
        local.discard_local("L1");
        assert!(local.read_local("L1").is_none());
        assert!(local.local_draft_ids().is_empty());
    }

    #[test]
    fn quota_is_enforced() {
        let storage = Arc::new(MemoryStorage::with_limit(16));
        let local = LocalDraftStore::new(storage);
        let err = local.save_local("L1", fields()).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }

    #[test]
    fn large_objects_expire_after_retention() {
        let (storage, local) = store();
        let now = Utc::now();
        let proof = ProofPayload::inline("image/png", b"png-bytes");

        let old = local.put_large_object(&proof, now - Duration::days(8)).unwrap();
        let recent = local.put_large_object(&proof, now - Duration::days(6)).unwrap();
        storage.set("large_data_garbage", "x").unwrap();

        assert!(old.starts_with(LARGE_OBJECT_PREFIX));
        assert_eq!(local.sweep_large_objects(now), 1);
        assert!(local.get_large_object(&old).is_none());
        assert_eq!(local.get_large_object(&recent), Some(proof));
        assert!(storage.get("large_data_garbage").unwrap().is_some());
    }
}
