use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use vouch_types::{NewDraft, ProofPayload};

use crate::cookie::{CookieDraftStore, CookieRead};
use crate::hosting::{draft_proof_path, host_inline_proof, is_issued_proof};
use crate::local::{LocalDraftStore, StoredDraft};
use crate::repository::{DraftRepository, ObjectStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated {
        draft_id: Uuid,
        replaced_existing: bool,
        /// The source proof could not be hosted and was left out.
        proof_dropped: bool,
    },
    /// The listing no longer exists; the draft was discarded.
    Orphaned,
    /// A durable draft at least as new already exists; the source was discarded.
    Superseded,
    /// Tracked in the manifest but no cookie was present.
    Missing,
    /// Unreadable cookie, abandoned.
    Corrupt(String),
    /// Left in place for the next attempt.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub entries: Vec<(String, MigrationOutcome)>,
}

impl MigrationReport {
    pub fn migrated(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Migrated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Failed(_)))
    }

    pub fn count(&self, pred: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn outcome(&self, listing_id: &str) -> Option<&MigrationOutcome> {
        self.entries
            .iter()
            .find(|(id, _)| id == listing_id)
            .map(|(_, o)| o)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn log(&self, tier: &str) {
        if self.is_empty() {
            return;
        }
        info!(
            tier,
            total = self.entries.len(),
            migrated = self.migrated(),
            orphaned = self.count(|o| matches!(o, MigrationOutcome::Orphaned)),
            superseded = self.count(|o| matches!(o, MigrationOutcome::Superseded)),
            missing = self.count(|o| matches!(o, MigrationOutcome::Missing)),
            corrupt = self.count(|o| matches!(o, MigrationOutcome::Corrupt(_))),
            failed = self.failed(),
            "draft migration finished"
        );
    }
}

/// Promotes browser and cookie drafts into the durable tier once the author
/// has a session.
pub struct Migrator {
    cookies: CookieDraftStore,
    drafts: Arc<dyn DraftRepository>,
    objects: Arc<dyn ObjectStore>,
}

impl Migrator {
    pub fn new(cookies: CookieDraftStore, drafts: Arc<dyn DraftRepository>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { cookies, drafts, objects }
    }

    fn local(&self) -> &LocalDraftStore {
        self.cookies.local()
    }

    /// Migrate every listing in the draft manifest, one at a time.
    pub async fn migrate_all_cookie_drafts(&self, author_id: Uuid) -> MigrationReport {
        let mut report = MigrationReport::default();

        let ids = match self.cookies.tracked_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Cookie migration skipped, manifest unavailable: {}", e);
                return report;
            }
        };

        for listing_id in ids {
            let outcome = self.migrate_cookie_draft(&listing_id, author_id).await;
            report.entries.push((listing_id, outcome));
        }

        report.log("cookie");
        report
    }

    /// Migrate browser-tier slots that have no cookie counterpart.
    pub async fn migrate_local_drafts(&self, author_id: Uuid) -> MigrationReport {
        let mut report = MigrationReport::default();

        for listing_id in self.local().local_draft_ids() {
            let Some(draft) = self.local().read_local(&listing_id) else {
                continue;
            };

            let outcome = match self.drafts.find_active_draft(&listing_id, author_id).await {
                Ok(Some(existing)) if existing.updated_at >= draft.saved_at => MigrationOutcome::Superseded,
                Ok(_) => self.promote(draft, author_id).await.0,
                Err(e) => MigrationOutcome::Failed(e.to_string()),
            };

            if !matches!(outcome, MigrationOutcome::Failed(_)) {
                self.local().discard_local(&listing_id);
            }
            report.entries.push((listing_id, outcome));
        }

        report.log("local");
        report
    }

    async fn migrate_cookie_draft(&self, listing_id: &str, author_id: Uuid) -> MigrationOutcome {
        let draft = match self.cookies.read_draft(listing_id).await {
            CookieRead::Found(draft) => draft,
            CookieRead::Missing => {
                self.cookies.remove_draft_id(listing_id).await;
                return MigrationOutcome::Missing;
            }
            CookieRead::Unavailable(reason) => {
                warn!("Cookie draft for {} unavailable, will retry: {}", listing_id, reason);
                return MigrationOutcome::Failed(reason);
            }
            CookieRead::Corrupt(reason) => {
                error!(listing_id = %listing_id, %reason, "corruption detected, draft abandoned");
                self.cookies.delete_draft(listing_id).await;
                self.cookies.remove_draft_id(listing_id).await;
                return MigrationOutcome::Corrupt(reason);
            }
        };

        let (outcome, reconciled) = self.promote(draft, author_id).await;
        match &outcome {
            MigrationOutcome::Failed(reason) => {
                warn!("Cookie draft for {} kept after failed migration: {}", listing_id, reason);
                // the parked object was released; writing the cookie parks the proof again
                self.cookies.put_draft(&reconciled).await;
            }
            _ => {
                self.cookies.delete_draft(listing_id).await;
                self.cookies.remove_draft_id(listing_id).await;
            }
        }
        outcome
    }

    /// Resolve any parked proof, reconcile, and release the parked object.
    /// Returns the outcome and the draft with its proof resolved.
    async fn promote(&self, mut draft: StoredDraft, author_id: Uuid) -> (MigrationOutcome, StoredDraft) {
        let parked = draft.large_data_id().map(str::to_string);
        if let Some(key) = &parked {
            draft.proof = self.local().get_large_object(key);
            if draft.proof.is_none() {
                warn!("Parked proof {} for {} is missing", key, draft.listing_id);
            }
        }

        let outcome = self.reconcile(&draft, author_id).await;

        if let Some(key) = parked {
            self.local().remove_large_object(&key);
        }
        (outcome, draft)
    }

    async fn reconcile(&self, draft: &StoredDraft, author_id: Uuid) -> MigrationOutcome {
        let owner_id = match self.drafts.listing_owner(&draft.listing_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                info!("Listing {} no longer exists, discarding draft", draft.listing_id);
                return MigrationOutcome::Orphaned;
            }
            Err(e) => return MigrationOutcome::Failed(e.to_string()),
        };

        let existing = match self.drafts.find_active_draft(&draft.listing_id, author_id).await {
            Ok(existing) => existing,
            Err(e) => return MigrationOutcome::Failed(e.to_string()),
        };

        let existing_path = existing.as_ref().and_then(|d| d.proof_file_name.clone());

        let mut proof_dropped = false;
        let mut uploaded = None;
        let hosted = match draft.proof.clone() {
            Some(proof @ ProofPayload::Inline { .. }) => {
                let now = Utc::now();
                match host_inline_proof(self.objects.as_ref(), &proof, |ext| {
                    draft_proof_path(owner_id, author_id, now, ext)
                })
                .await
                {
                    Ok(hosted) => {
                        uploaded = Some(hosted.path.clone());
                        Some((hosted.url, hosted.media_kind, Some(hosted.path)))
                    }
                    Err(e) => {
                        warn!("Proof upload for {} failed, migrating without it: {}", draft.listing_id, e);
                        proof_dropped = true;
                        None
                    }
                }
            }
            // only the durable draft's own object can be carried over by url
            Some(ProofPayload::Hosted { url, media_kind }) => match existing_path.as_deref() {
                Some(path) if is_issued_proof(self.objects.as_ref(), &url, path, owner_id, author_id) => {
                    Some((url, media_kind, Some(path.to_string())))
                }
                _ => {
                    warn!("Hosted proof for {} was not issued for this draft, migrating without it", draft.listing_id);
                    proof_dropped = true;
                    None
                }
            },
            Some(ProofPayload::Pointer { .. }) => {
                proof_dropped = true;
                None
            }
            None => None,
        };

        // without a new proof, keep whatever the durable draft already has
        let (proof_url, proof_kind, proof_file_name) = match hosted {
            Some((url, kind, path)) => (Some(url), Some(kind), path),
            None => existing
                .as_ref()
                .map(|d| (d.proof_url.clone(), d.proof_kind, d.proof_file_name.clone()))
                .unwrap_or_default(),
        };

        let new_draft = NewDraft {
            listing_id: draft.listing_id.clone(),
            author_id,
            rating: draft.rating,
            body_text: draft.body_text.clone(),
            experience_date: draft.experience_date,
            proof_url,
            proof_kind,
            proof_file_name,
            updated_at: Utc::now(),
        };

        match self.drafts.upsert_draft(&new_draft).await {
            Ok(saved) => {
                if let Some(old) = existing_path.filter(|old| saved.proof_file_name.as_ref() != Some(old)) {
                    self.delete_object(&old).await;
                }
                MigrationOutcome::Migrated {
                    draft_id: saved.id,
                    replaced_existing: existing.is_some(),
                    proof_dropped,
                }
            }
            Err(e) => {
                if let Some(path) = uploaded.filter(|path| existing_path.as_ref() != Some(path)) {
                    self.delete_object(&path).await;
                }
                MigrationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn delete_object(&self, path: &str) {
        if let Err(e) = self.objects.delete(path).await {
            warn!("Failed to delete proof object {}: {}", path, e);
        }
    }
}
