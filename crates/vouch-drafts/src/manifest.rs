use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::cookie::{CookieDraftStore, CookieError};

/// Cookie listing the listing ids that have an outstanding draft cookie.
pub const MANIFEST_COOKIE: &str = "draft_review_ids";
pub const MANIFEST_COOKIE_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftManifest {
    listing_ids: BTreeSet<String>,
}

impl DraftManifest {
    /// Parse a manifest cookie value. Anything but an array is corrupt;
    /// non-string entries inside an array are dropped.
    pub fn parse(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        let listing_ids = items
            .iter()
            .filter_map(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self { listing_ids })
    }

    pub fn contains(&self, listing_id: &str) -> bool {
        self.listing_ids.contains(listing_id)
    }

    pub fn insert(&mut self, listing_id: &str) -> bool {
        self.listing_ids.insert(listing_id.to_string())
    }

    pub fn remove(&mut self, listing_id: &str) -> bool {
        self.listing_ids.remove(listing_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.listing_ids.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.listing_ids.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.listing_ids.iter().cloned().map(Value::String).collect())
    }
}

impl CookieDraftStore {
    /// Read the manifest. A corrupted manifest is reset to empty; a transport
    /// failure is returned so callers can leave existing cookies alone.
    pub async fn manifest(&self) -> Result<DraftManifest, CookieError> {
        let Some(value) = self.channel.get(MANIFEST_COOKIE).await? else {
            return Ok(DraftManifest::default());
        };

        match DraftManifest::parse(&value) {
            Some(manifest) => Ok(manifest),
            None => {
                warn!("Draft manifest cookie is corrupted, resetting");
                let empty = DraftManifest::default();
                self.write_manifest(&empty).await;
                Ok(empty)
            }
        }
    }

    pub async fn tracked_ids(&self) -> Result<Vec<String>, CookieError> {
        Ok(self.manifest().await?.ids())
    }

    pub async fn track_draft_id(&self, listing_id: &str) -> bool {
        let mut manifest = match self.manifest().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Draft manifest unavailable, {} not tracked: {}", listing_id, e);
                return false;
            }
        };
        if !manifest.insert(listing_id) {
            return true;
        }
        self.write_manifest(&manifest).await
    }

    pub async fn remove_draft_id(&self, listing_id: &str) -> bool {
        let mut manifest = match self.manifest().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Draft manifest unavailable, {} not untracked: {}", listing_id, e);
                return false;
            }
        };
        if !manifest.remove(listing_id) {
            return true;
        }
        self.write_manifest(&manifest).await
    }

    async fn write_manifest(&self, manifest: &DraftManifest) -> bool {
        self.set_cookie(MANIFEST_COOKIE, manifest.to_value(), MANIFEST_COOKIE_DAYS)
            .await
    }
}
