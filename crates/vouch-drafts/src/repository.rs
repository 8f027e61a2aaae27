use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use vouch_types::{AuthorProfile, Draft, NewDraft, NewReview, Review};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Durable draft storage. Implemented over SQLite on the server and over
/// REST by the client.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Owner of a listing, or `None` when the listing does not exist.
    async fn listing_owner(&self, listing_id: &str) -> Result<Option<Uuid>, StoreError>;

    async fn find_active_draft(&self, listing_id: &str, author_id: Uuid) -> Result<Option<Draft>, StoreError>;

    async fn get_draft(&self, id: Uuid) -> Result<Option<Draft>, StoreError>;

    /// Insert or update the single active draft for (listing, author).
    async fn upsert_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError>;

    async fn delete_draft(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Remove the author's active drafts last updated before `cutoff` and
    /// return them so their proof objects can be cleaned up.
    async fn delete_stale_drafts(&self, author_id: Uuid, cutoff: DateTime<Utc>) -> Result<Vec<Draft>, StoreError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn author_profile(&self, author_id: Uuid) -> Result<Option<AuthorProfile>, StoreError>;

    async fn review_exists(&self, owner_id: Uuid, author_id: Uuid) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::Conflict`] when (owner, author) already has a review.
    async fn insert_review(&self, review: &NewReview) -> Result<Review, StoreError>;
}

/// Blob storage for hosted proofs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return the public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError>;

    fn public_url(&self, path: &str) -> String;

    /// Missing objects are not an error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}
