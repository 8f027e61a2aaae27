use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use vouch_types::ProofPayload;

use crate::local::{LocalDraftStore, StorageError, StoredDraft, draft_key};

/// Serialized cookie values above this many characters have their inline
/// proof moved to local storage.
pub const COOKIE_SAFETY_THRESHOLD: usize = 3000;
pub const DRAFT_COOKIE_DAYS: u32 = 7;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie transport error: {0}")]
    Transport(String),
    #[error("cookie endpoint rejected request with status {0}")]
    Rejected(u16),
}

/// The server-mediated cookie endpoint.
#[async_trait]
pub trait CookieChannel: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Value>, CookieError>;
    async fn set(&self, name: &str, value: &Value, expires_days: u32) -> Result<(), CookieError>;
    async fn delete(&self, name: &str) -> Result<(), CookieError>;
}

/// Result of reading a draft cookie. Unlike the general accessors, this
/// keeps corruption distinct from absence so migration can fail closed.
#[derive(Debug)]
pub enum CookieRead {
    Missing,
    Found(StoredDraft),
    Corrupt(String),
    Unavailable(String),
}

/// Cookie-tier draft store.
#[derive(Clone)]
pub struct CookieDraftStore {
    pub(crate) channel: Arc<dyn CookieChannel>,
    local: LocalDraftStore,
}

impl CookieDraftStore {
    pub fn new(channel: Arc<dyn CookieChannel>, local: LocalDraftStore) -> Self {
        Self { channel, local }
    }

    pub fn local(&self) -> &LocalDraftStore {
        &self.local
    }

    /// Write a cookie. Returns `false` on any failure; the endpoint is
    /// best-effort and the browser tier still holds the draft.
    pub async fn set_cookie(&self, name: &str, value: Value, expires_days: u32) -> bool {
        let value = match self.evict_if_oversized(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cookie {} not written, proof eviction failed: {}", name, e);
                return false;
            }
        };

        match self.channel.set(name, &value, expires_days).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to set cookie {}: {}", name, e);
                false
            }
        }
    }

    /// Read a cookie, treating every failure as absence.
    pub async fn get_cookie(&self, name: &str) -> Option<Value> {
        match self.channel.get(name).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Cookie {} unavailable: {}", name, e);
                None
            }
        }
    }

    pub async fn delete_cookie(&self, name: &str) -> bool {
        match self.channel.delete(name).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete cookie {}: {}", name, e);
                false
            }
        }
    }

    pub async fn put_draft(&self, draft: &StoredDraft) -> bool {
        let value = match serde_json::to_value(draft) {
            Ok(v) => v,
            Err(e) => {
                warn!("Draft for {} not serializable: {}", draft.listing_id, e);
                return false;
            }
        };
        self.set_cookie(&draft_key(&draft.listing_id), value, DRAFT_COOKIE_DAYS)
            .await
    }

    pub async fn read_draft(&self, listing_id: &str) -> CookieRead {
        let value = match self.channel.get(&draft_key(listing_id)).await {
            Ok(Some(value)) => value,
            Ok(None) => return CookieRead::Missing,
            Err(e) => return CookieRead::Unavailable(e.to_string()),
        };

        match serde_json::from_value::<StoredDraft>(value) {
            Ok(draft) if draft.listing_id == listing_id => CookieRead::Found(draft),
            Ok(draft) => CookieRead::Corrupt(format!(
                "cookie for {} holds listing {}",
                listing_id, draft.listing_id
            )),
            Err(e) => CookieRead::Corrupt(e.to_string()),
        }
    }

    pub async fn delete_draft(&self, listing_id: &str) -> bool {
        self.delete_cookie(&draft_key(listing_id)).await
    }

    fn evict_if_oversized(&self, mut value: Value) -> Result<Value, StorageError> {
        let size = value.to_string().len();
        if size <= COOKIE_SAFETY_THRESHOLD {
            return Ok(value);
        }

        let Some(slot) = value.get_mut("proof") else {
            return Ok(value);
        };
        let Some(proof) = inline_proof(slot) else {
            return Ok(value);
        };

        let key = self.local.put_large_object(&proof, Utc::now())?;
        info!("Cookie value is {} chars, parked proof as {}", size, key);
        *slot = json!({ "kind": "pointer", "object_key": key });
        Ok(value)
    }
}

/// Inline proof held in a cookie value slot, in tagged or legacy form.
fn inline_proof(slot: &Value) -> Option<ProofPayload> {
    match slot {
        Value::String(raw) if !raw.trim().is_empty() => Some(ProofPayload::repair_legacy(raw)),
        Value::Object(_) => serde_json::from_value::<ProofPayload>(slot.clone())
            .ok()
            .filter(ProofPayload::is_inline),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Cookie jar that can be switched into a failing state.
    #[derive(Default)]
    pub struct MemoryJar {
        pub cookies: Mutex<HashMap<String, Value>>,
        pub offline: Mutex<bool>,
    }

    impl MemoryJar {
        pub fn insert(&self, name: &str, value: Value) {
            self.cookies.lock().unwrap().insert(name.to_string(), value);
        }

        pub fn value(&self, name: &str) -> Option<Value> {
            self.cookies.lock().unwrap().get(name).cloned()
        }

        fn check(&self) -> Result<(), CookieError> {
            if *self.offline.lock().unwrap() {
                Err(CookieError::Transport("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CookieChannel for MemoryJar {
        async fn get(&self, name: &str) -> Result<Option<Value>, CookieError> {
            self.check()?;
            Ok(self.value(name))
        }

        async fn set(&self, name: &str, value: &Value, _expires_days: u32) -> Result<(), CookieError> {
            self.check()?;
            self.insert(name, value.clone());
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<(), CookieError> {
            self.check()?;
            self.cookies.lock().unwrap().remove(name);
            Ok(())
        }
    }
}
