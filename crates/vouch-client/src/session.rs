use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vouch_drafts::{
    CookieDraftStore, CookieRead, LocalDraftStore, LocalStorage, MigrationReport,
    Migrator, StoredDraft, sweep_stale_drafts, validate,
};
use vouch_types::api::{PublishRequest, SaveDraftRequest};
use vouch_types::{Draft, DraftFields, ProofPayload, Review};

use crate::api::ApiClient;
use crate::error::ClientError;

/// Where a save landed.
#[derive(Debug, Clone)]
pub enum SavedDraft {
    Durable(Draft),
    /// Anonymous save. `in_cookie` is false when the cookie tier refused it.
    Local { draft: StoredDraft, in_cookie: bool },
}

/// What happened on app load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub large_objects_swept: usize,
    pub cookie: MigrationReport,
    pub local: MigrationReport,
    pub stale_drafts_swept: usize,
}

/// The review form's view of all three draft tiers.
pub struct DraftSession {
    client: Arc<ApiClient>,
    cookies: CookieDraftStore,
    migrator: Migrator,
}

impl DraftSession {
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn LocalStorage>) -> Self {
        let cookies = CookieDraftStore::new(client.clone(), LocalDraftStore::new(storage));
        let migrator = Migrator::new(cookies.clone(), client.clone(), client.clone());
        Self {
            client,
            cookies,
            migrator,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn local(&self) -> &LocalDraftStore {
        self.cookies.local()
    }

    pub fn cookies(&self) -> &CookieDraftStore {
        &self.cookies
    }

    fn author(&self) -> Option<Uuid> {
        self.client.session().map(|s| s.user_id)
    }

    /// Housekeeping run on every app load. Migration and the stale sweep
    /// only happen with a session.
    pub async fn on_page_load(&self, now: DateTime<Utc>) -> LoadReport {
        let mut report = LoadReport {
            large_objects_swept: self.local().sweep_large_objects(now),
            ..Default::default()
        };

        let Some(author_id) = self.author() else {
            debug!("No session, skipping draft migration");
            return report;
        };

        report.cookie = self.migrator.migrate_all_cookie_drafts(author_id).await;
        report.local = self.migrator.migrate_local_drafts(author_id).await;

        let client = self.client.as_ref();
        match sweep_stale_drafts(client, client, author_id, now).await {
            Ok(n) => report.stale_drafts_swept = n,
            Err(e) => warn!("Stale draft sweep failed: {}", e),
        }
        report
    }

    /// Save the form. Signed-in authors save durably; anonymous saves go to
    /// the browser and cookie tiers and are tracked for later migration.
    pub async fn save_progress(&self, listing_id: &str, mut fields: DraftFields) -> Result<SavedDraft, ClientError> {
        if self.author().is_some() {
            fields.proof = self.resolve_proof(fields.proof);
            let req = SaveDraftRequest {
                listing_id: listing_id.to_string(),
                fields,
                proof_file_name: None,
            };
            return Ok(SavedDraft::Durable(self.client.save_draft(&req).await?));
        }

        let draft = self.local().save_local(listing_id, fields)?;
        let in_cookie = self.cookies.put_draft(&draft).await;
        if in_cookie {
            self.cookies.track_draft_id(listing_id).await;
        } else {
            warn!("Cookie tier refused draft for {}, kept locally only", listing_id);
        }
        Ok(SavedDraft::Local { draft, in_cookie })
    }

    /// Best available draft for the listing: durable when signed in,
    /// otherwise the browser slot, then the cookie.
    pub async fn load_draft(&self, listing_id: &str) -> Result<Option<DraftFields>, ClientError> {
        if self.author().is_some() {
            let draft = self.client.active_draft(listing_id).await?;
            return Ok(draft.map(|d| d.fields()));
        }

        if let Some(draft) = self.local().read_local(listing_id) {
            return Ok(Some(draft.fields()));
        }

        match self.cookies.read_draft(listing_id).await {
            CookieRead::Found(draft) => {
                let mut fields = draft.fields();
                fields.proof = self.resolve_proof(fields.proof);
                Ok(Some(fields))
            }
            _ => Ok(None),
        }
    }

    /// Validate locally, then publish. Client tiers for the listing are
    /// cleared only after the server accepts the review.
    pub async fn publish(&self, listing_id: &str, mut fields: DraftFields) -> Result<Review, ClientError> {
        fields.proof = self.resolve_proof(fields.proof);
        validate(listing_id, &fields)?;
        if self.author().is_none() {
            return Err(ClientError::NotAuthenticated);
        }

        let req = PublishRequest {
            listing_id: listing_id.to_string(),
            fields,
        };
        let review = self.client.publish(&req).await?;

        self.clear_client_tiers(listing_id).await;
        info!("Published review {} for {}", review.id, listing_id);
        Ok(review)
    }

    /// Drop the draft from every tier. `draft_id` names the durable draft,
    /// when there is one.
    pub async fn discard(&self, listing_id: &str, draft_id: Option<Uuid>) -> Result<(), ClientError> {
        if let Some(id) = draft_id {
            self.client.discard(id).await?;
        }
        self.clear_client_tiers(listing_id).await;
        Ok(())
    }

    async fn clear_client_tiers(&self, listing_id: &str) {
        if let CookieRead::Found(draft) = self.cookies.read_draft(listing_id).await {
            if let Some(key) = draft.large_data_id() {
                self.local().remove_large_object(key);
            }
        }
        self.cookies.delete_draft(listing_id).await;
        self.cookies.remove_draft_id(listing_id).await;
        self.local().discard_local(listing_id);
    }

    /// Swap a pointer for the parked proof it names. A dangling pointer
    /// becomes no proof.
    fn resolve_proof(&self, proof: Option<ProofPayload>) -> Option<ProofPayload> {
        match proof {
            Some(ProofPayload::Pointer { object_key }) => {
                let parked = self.local().get_large_object(&object_key);
                if parked.is_none() {
                    warn!("Parked proof {} is missing", object_key);
                }
                parked
            }
            other => other,
        }
    }
}
