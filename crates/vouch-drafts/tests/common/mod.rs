#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use vouch_drafts::{
    CookieChannel, CookieDraftStore, CookieError, DraftRepository, LocalDraftStore, MemoryStorage, Migrator,
    ObjectStore, Publisher, ReviewRepository, StoreError,
};
use vouch_types::{AccountType, AuthorProfile, Draft, DraftStatus, NewDraft, NewReview, Review};

#[derive(Default)]
pub struct Jar {
    cookies: Mutex<HashMap<String, Value>>,
    pub offline: AtomicBool,
}

impl Jar {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.cookies.lock().unwrap().get(name).cloned()
    }

    pub fn put(&self, name: &str, value: Value) {
        self.cookies.lock().unwrap().insert(name.to_string(), value);
    }

    fn check(&self) -> Result<(), CookieError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CookieError::Transport("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CookieChannel for Jar {
    async fn get(&self, name: &str) -> Result<Option<Value>, CookieError> {
        self.check()?;
        Ok(Jar::get(self, name))
    }

    async fn set(&self, name: &str, value: &Value, _expires_days: u32) -> Result<(), CookieError> {
        self.check()?;
        self.put(name, value.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CookieError> {
        self.check()?;
        self.cookies.lock().unwrap().remove(name);
        Ok(())
    }
}

/// In-memory datastore with the same uniqueness rules as the SQLite schema.
#[derive(Default)]
pub struct Datastore {
    pub listings: Mutex<HashMap<String, Uuid>>,
    pub profiles: Mutex<HashMap<Uuid, AuthorProfile>>,
    pub drafts: Mutex<Vec<Draft>>,
    pub reviews: Mutex<Vec<Review>>,
    pub fail_upserts: AtomicBool,
    pub review_inserts: AtomicUsize,
}

impl Datastore {
    pub fn add_listing(&self, id: &str, owner: Uuid) {
        self.listings.lock().unwrap().insert(id.to_string(), owner);
    }

    pub fn add_author(&self, id: Uuid, account_type: AccountType, verified: bool) {
        self.profiles.lock().unwrap().insert(
            id,
            AuthorProfile {
                id,
                email: format!("{}@example.com", id.simple()),
                account_type,
                verified,
            },
        );
    }

    pub fn active_drafts(&self, listing_id: &str, author_id: Uuid) -> Vec<Draft> {
        self.drafts
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.listing_id == listing_id && d.author_id == author_id && d.status == DraftStatus::Draft)
            .cloned()
            .collect()
    }

    pub fn set_updated_at(&self, id: Uuid, updated_at: DateTime<Utc>) {
        for d in self.drafts.lock().unwrap().iter_mut().filter(|d| d.id == id) {
            d.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl DraftRepository for Datastore {
    async fn listing_owner(&self, listing_id: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self.listings.lock().unwrap().get(listing_id).copied())
    }

    async fn find_active_draft(&self, listing_id: &str, author_id: Uuid) -> Result<Option<Draft>, StoreError> {
        Ok(self.active_drafts(listing_id, author_id).into_iter().next())
    }

    async fn get_draft(&self, id: Uuid) -> Result<Option<Draft>, StoreError> {
        Ok(self.drafts.lock().unwrap().iter().find(|d| d.id == id).cloned())
    }

    async fn upsert_draft(&self, new: &NewDraft) -> Result<Draft, StoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("datastore offline".into()));
        }

        let mut drafts = self.drafts.lock().unwrap();
        let existing = drafts
            .iter_mut()
            .find(|d| d.listing_id == new.listing_id && d.author_id == new.author_id && d.status == DraftStatus::Draft);

        let draft = match existing {
            Some(d) => {
                d.rating = new.rating;
                d.body_text = new.body_text.clone();
                d.experience_date = new.experience_date;
                d.proof_url = new.proof_url.clone();
                d.proof_kind = new.proof_kind;
                d.proof_file_name = new.proof_file_name.clone();
                d.updated_at = new.updated_at;
                d.clone()
            }
            None => {
                let d = Draft {
                    id: Uuid::new_v4(),
                    listing_id: new.listing_id.clone(),
                    author_id: new.author_id,
                    rating: new.rating,
                    body_text: new.body_text.clone(),
                    experience_date: new.experience_date,
                    proof_url: new.proof_url.clone(),
                    proof_kind: new.proof_kind,
                    proof_file_name: new.proof_file_name.clone(),
                    status: DraftStatus::Draft,
                    created_at: new.updated_at,
                    updated_at: new.updated_at,
                };
                drafts.push(d.clone());
                d
            }
        };
        Ok(draft)
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut drafts = self.drafts.lock().unwrap();
        let before = drafts.len();
        drafts.retain(|d| d.id != id);
        Ok(drafts.len() != before)
    }

    async fn delete_stale_drafts(&self, author_id: Uuid, cutoff: DateTime<Utc>) -> Result<Vec<Draft>, StoreError> {
        let mut drafts = self.drafts.lock().unwrap();
        let (stale, keep): (Vec<Draft>, Vec<Draft>) = drafts
            .drain(..)
            .partition(|d| d.author_id == author_id && d.status == DraftStatus::Draft && d.updated_at < cutoff);
        *drafts = keep;
        Ok(stale)
    }
}

#[async_trait]
impl ReviewRepository for Datastore {
    async fn author_profile(&self, author_id: Uuid) -> Result<Option<AuthorProfile>, StoreError> {
        Ok(self.profiles.lock().unwrap().get(&author_id).cloned())
    }

    async fn review_exists(&self, owner_id: Uuid, author_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.owner_id == owner_id && r.author_id == author_id))
    }

    async fn insert_review(&self, new: &NewReview) -> Result<Review, StoreError> {
        self.review_inserts.fetch_add(1, Ordering::SeqCst);
        let mut reviews = self.reviews.lock().unwrap();
        if reviews
            .iter()
            .any(|r| r.owner_id == new.owner_id && r.author_id == new.author_id)
        {
            return Err(StoreError::Conflict("reviews.owner_id, reviews.author_id".into()));
        }

        let review = Review {
            id: Uuid::new_v4(),
            listing_id: new.listing_id.clone(),
            owner_id: new.owner_id,
            author_id: new.author_id,
            rating: new.rating,
            body_text: new.body_text.clone(),
            experience_date: new.experience_date,
            proof_url: new.proof_url.clone(),
            proof_kind: new.proof_kind,
            created_at: new.created_at,
        };
        reviews.push(review.clone());
        Ok(review)
    }
}

#[derive(Default)]
pub struct Objects {
    pub blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub fail_uploads: AtomicBool,
}

impl Objects {
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for Objects {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("bucket unavailable".into()));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://objects.test/{}", path)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }
}

pub struct Harness {
    pub jar: Arc<Jar>,
    pub storage: Arc<MemoryStorage>,
    pub cookies: CookieDraftStore,
    pub db: Arc<Datastore>,
    pub objects: Arc<Objects>,
}

impl Harness {
    pub fn new() -> Self {
        let jar = Arc::new(Jar::default());
        let storage = Arc::new(MemoryStorage::new());
        let local = LocalDraftStore::new(storage.clone());
        Self {
            cookies: CookieDraftStore::new(jar.clone(), local),
            jar,
            storage,
            db: Arc::new(Datastore::default()),
            objects: Arc::new(Objects::default()),
        }
    }

    pub fn local(&self) -> &LocalDraftStore {
        self.cookies.local()
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.cookies.clone(), self.db.clone(), self.objects.clone())
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.db.clone(), self.db.clone(), self.objects.clone())
    }
}
