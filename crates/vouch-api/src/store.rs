use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use vouch_db::{Database, DbError};
use vouch_drafts::{DraftRepository, ReviewRepository, StoreError};
use vouch_types::{AuthorProfile, Draft, NewDraft, NewReview, Review};

/// Run a blocking database call off the async runtime.
pub async fn with_db<F, T>(db: &Arc<Database>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Database) -> vouch_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::backend(e)
        })?
        .map_err(|e| match e {
            DbError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::backend(other),
        })
}

/// The durable tier over SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DraftRepository for SqliteStore {
    async fn listing_owner(&self, listing_id: &str) -> Result<Option<Uuid>, StoreError> {
        let id = listing_id.to_string();
        let listing = with_db(&self.db, move |db| db.get_listing(&id)).await?;
        Ok(listing.map(|l| l.owner_id))
    }

    async fn find_active_draft(&self, listing_id: &str, author_id: Uuid) -> Result<Option<Draft>, StoreError> {
        let id = listing_id.to_string();
        with_db(&self.db, move |db| db.find_active_draft(&id, author_id)).await
    }

    async fn get_draft(&self, id: Uuid) -> Result<Option<Draft>, StoreError> {
        with_db(&self.db, move |db| db.get_draft(id)).await
    }

    async fn upsert_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError> {
        let draft = draft.clone();
        with_db(&self.db, move |db| db.upsert_draft(&draft)).await
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, StoreError> {
        with_db(&self.db, move |db| db.delete_draft(id)).await
    }

    async fn delete_stale_drafts(&self, author_id: Uuid, cutoff: DateTime<Utc>) -> Result<Vec<Draft>, StoreError> {
        with_db(&self.db, move |db| db.delete_stale_drafts(Some(author_id), cutoff)).await
    }
}

#[async_trait]
impl ReviewRepository for SqliteStore {
    async fn author_profile(&self, author_id: Uuid) -> Result<Option<AuthorProfile>, StoreError> {
        with_db(&self.db, move |db| db.author_profile(author_id)).await
    }

    async fn review_exists(&self, owner_id: Uuid, author_id: Uuid) -> Result<bool, StoreError> {
        with_db(&self.db, move |db| db.review_exists(owner_id, author_id)).await
    }

    async fn insert_review(&self, review: &NewReview) -> Result<Review, StoreError> {
        let review = review.clone();
        with_db(&self.db, move |db| db.insert_review(&review)).await
    }
}
