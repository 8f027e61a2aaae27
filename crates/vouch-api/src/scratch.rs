use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use vouch_db::Database;
use vouch_drafts::StoreError;

use crate::store::with_db;

/// Scratch entries live this long.
pub const SCRATCH_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq)]
pub enum ScratchLookup {
    Found(Value),
    Expired,
    Missing,
}

/// Short-lived payload store. An entry is expired from its `expires_at`
/// instant onward.
#[async_trait]
pub trait ScratchStore: Send + Sync {
    async fn put(&self, data: Value, expires_at: DateTime<Utc>) -> Result<String, StoreError>;

    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<ScratchLookup, StoreError>;

    /// Remove expired entries, returning how many were dropped.
    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Process-local store. Entries are lost on restart.
#[derive(Default)]
pub struct MemoryScratch {
    entries: Mutex<HashMap<String, (Value, DateTime<Utc>)>>,
}

impl MemoryScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("scratch lock poisoned".into())
}

#[async_trait]
impl ScratchStore for MemoryScratch {
    async fn put(&self, data: Value, expires_at: DateTime<Utc>) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(id.clone(), (data, expires_at));
        Ok(id)
    }

    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<ScratchLookup, StoreError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let lookup = match entries.get(id) {
            None => ScratchLookup::Missing,
            Some((_, expires_at)) if now >= *expires_at => ScratchLookup::Expired,
            Some((data, _)) => return Ok(ScratchLookup::Found(data.clone())),
        };
        if lookup == ScratchLookup::Expired {
            entries.remove(id);
        }
        Ok(lookup)
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        Ok(before - entries.len())
    }
}

/// Scratch entries in the `scratch` table, shared by every server process
/// that opens the same database.
pub struct SqliteScratch {
    db: Arc<Database>,
}

impl SqliteScratch {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScratchStore for SqliteScratch {
    async fn put(&self, data: Value, expires_at: DateTime<Utc>) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let raw = data.to_string();
        let key = id.clone();
        with_db(&self.db, move |db| db.put_scratch(&key, &raw, expires_at)).await?;
        Ok(id)
    }

    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<ScratchLookup, StoreError> {
        let key = id.to_string();
        let Some((raw, expires_at)) = with_db(&self.db, move |db| db.get_scratch(&key)).await? else {
            return Ok(ScratchLookup::Missing);
        };

        if now >= expires_at {
            let key = id.to_string();
            with_db(&self.db, move |db| db.delete_scratch(&key)).await?;
            return Ok(ScratchLookup::Expired);
        }

        let data = serde_json::from_str(&raw).map_err(StoreError::backend)?;
        Ok(ScratchLookup::Found(data))
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        with_db(&self.db, move |db| db.delete_expired_scratch(now)).await
    }
}
