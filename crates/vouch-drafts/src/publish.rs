use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use vouch_types::{AccountType, Draft, DraftFields, NewReview, ProofPayload, Review};

use crate::hosting::{ProofUploadError, host_inline_proof, is_issued_proof, review_proof_path};
use crate::repository::{DraftRepository, ObjectStore, ReviewRepository, StoreError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("proof is parked on another device and cannot be published")]
    UnresolvedProof,
    #[error("invalid proof: {0}")]
    InvalidProof(String),
    #[error("author account not found")]
    AccountNotFound,
    #[error("only customer accounts can publish reviews")]
    WrongAccountType,
    #[error("account must be verified before publishing")]
    NotVerified,
    #[error("authors cannot review their own listing")]
    OwnListing,
    #[error("listing not found")]
    ListingNotFound,
    #[error("a review for this business already exists")]
    AlreadyReviewed,
    #[error("draft not found")]
    DraftNotFound,
    #[error("proof upload failed: {0}")]
    Upload(#[from] ProofUploadError),
    #[error("datastore unavailable: {0}")]
    Store(#[from] StoreError),
}

impl PublishError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidRating(_) => "invalid_rating",
            Self::UnresolvedProof => "unresolved_proof",
            Self::InvalidProof(_) => "invalid_proof",
            Self::AccountNotFound => "account_not_found",
            Self::WrongAccountType => "wrong_account_type",
            Self::NotVerified => "not_verified",
            Self::OwnListing => "own_listing",
            Self::ListingNotFound => "listing_not_found",
            Self::AlreadyReviewed => "already_reviewed",
            Self::DraftNotFound => "draft_not_found",
            Self::Upload(ProofUploadError::Proof(_)) => "invalid_proof",
            Self::Upload(ProofUploadError::Store(_)) => "upload_failed",
            Self::Store(_) => "unavailable",
        }
    }
}

/// Form values that passed local validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub listing_id: String,
    pub rating: u8,
    pub body_text: String,
    pub experience_date: NaiveDate,
    pub proof: ProofPayload,
}

/// Checks that need no network access.
pub fn validate(listing_id: &str, fields: &DraftFields) -> Result<ValidSubmission, PublishError> {
    if listing_id.trim().is_empty() {
        return Err(PublishError::MissingField("listing_id"));
    }

    let rating = fields.rating.ok_or(PublishError::MissingField("rating"))?;
    if !(1..=5).contains(&rating) {
        return Err(PublishError::InvalidRating(rating));
    }

    let body_text = fields
        .body_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(PublishError::MissingField("body_text"))?;

    let experience_date = fields
        .experience_date
        .ok_or(PublishError::MissingField("experience_date"))?;

    let proof = fields.proof.clone().ok_or(PublishError::MissingField("proof"))?;
    match &proof {
        ProofPayload::Pointer { .. } => return Err(PublishError::UnresolvedProof),
        ProofPayload::Inline { data, .. } if data.is_empty() => {
            return Err(PublishError::MissingField("proof"));
        }
        ProofPayload::Inline { mime_type, .. } if proof.media_kind().is_none() => {
            return Err(PublishError::InvalidProof(format!(
                "media type '{}' is not an image or video",
                mime_type
            )));
        }
        _ => {}
    }

    Ok(ValidSubmission {
        listing_id: listing_id.to_string(),
        rating,
        body_text: body_text.to_string(),
        experience_date,
        proof,
    })
}

/// Publish and discard transitions for durable drafts.
#[derive(Clone)]
pub struct Publisher {
    drafts: Arc<dyn DraftRepository>,
    reviews: Arc<dyn ReviewRepository>,
    objects: Arc<dyn ObjectStore>,
}

impl Publisher {
    pub fn new(
        drafts: Arc<dyn DraftRepository>,
        reviews: Arc<dyn ReviewRepository>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { drafts, reviews, objects }
    }

    /// Turn the form into a review. Every rule is checked before the insert;
    /// the unique index on (owner, author) settles concurrent publishes.
    pub async fn publish(&self, listing_id: &str, fields: &DraftFields, author_id: Uuid) -> Result<Review, PublishError> {
        let valid = validate(listing_id, fields)?;

        let profile = self
            .reviews
            .author_profile(author_id)
            .await?
            .ok_or(PublishError::AccountNotFound)?;
        if profile.account_type != AccountType::Customer {
            return Err(PublishError::WrongAccountType);
        }
        if !profile.verified {
            return Err(PublishError::NotVerified);
        }

        let owner_id = self
            .drafts
            .listing_owner(&valid.listing_id)
            .await?
            .ok_or(PublishError::ListingNotFound)?;
        if owner_id == author_id {
            return Err(PublishError::OwnListing);
        }

        if self.reviews.review_exists(owner_id, author_id).await? {
            return Err(PublishError::AlreadyReviewed);
        }

        // a hosted proof must be the one the active draft already holds
        let draft = self.drafts.find_active_draft(&valid.listing_id, author_id).await?;
        let draft_proof = draft.as_ref().and_then(|d| d.proof_file_name.clone());

        let now = Utc::now();
        let (proof_url, proof_kind, uploaded) = match &valid.proof {
            ProofPayload::Hosted { url, media_kind } => {
                let issued = draft_proof
                    .as_deref()
                    .is_some_and(|path| is_issued_proof(self.objects.as_ref(), url, path, owner_id, author_id));
                if !issued {
                    return Err(PublishError::InvalidProof(format!("{} is not this draft's hosted proof", url)));
                }
                (url.clone(), *media_kind, None)
            }
            inline => {
                let hosted = host_inline_proof(self.objects.as_ref(), inline, |ext| {
                    review_proof_path(owner_id, author_id, now, ext)
                })
                .await?;
                (hosted.url, hosted.media_kind, Some(hosted.path))
            }
        };

        let new_review = NewReview {
            listing_id: valid.listing_id.clone(),
            owner_id,
            author_id,
            rating: valid.rating,
            body_text: valid.body_text,
            experience_date: valid.experience_date,
            proof_url,
            proof_kind,
            created_at: now,
        };

        let review = match self.reviews.insert_review(&new_review).await {
            Ok(review) => review,
            Err(e) => {
                if let Some(path) = &uploaded {
                    self.delete_object(path).await;
                }
                return Err(match e {
                    StoreError::Conflict(_) => PublishError::AlreadyReviewed,
                    other => other.into(),
                });
            }
        };

        if let Some(draft) = draft {
            match self.drafts.delete_draft(draft.id).await {
                // the review kept its own copy, so the draft's object is unreferenced
                Ok(_) if uploaded.is_some() => {
                    if let Some(path) = &draft.proof_file_name {
                        self.delete_object(path).await;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Review {} published but draft {} not removed: {}", review.id, draft.id, e),
            }
        }

        info!("Review {} published for listing {} by {}", review.id, review.listing_id, author_id);
        Ok(review)
    }

    /// Delete a durable draft and its hosted proof.
    pub async fn discard(&self, draft_id: Uuid, author_id: Uuid) -> Result<Draft, PublishError> {
        let draft = self
            .drafts
            .get_draft(draft_id)
            .await?
            .filter(|d| d.author_id == author_id)
            .ok_or(PublishError::DraftNotFound)?;

        if let Some(path) = &draft.proof_file_name {
            self.delete_object(path).await;
        }
        self.drafts.delete_draft(draft.id).await?;

        info!("Draft {} discarded by {}", draft.id, author_id);
        Ok(draft)
    }

    async fn delete_object(&self, path: &str) {
        if let Err(e) = self.objects.delete(path).await {
            warn!("Failed to delete proof object {}: {}", path, e);
        }
    }
}
