use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use vouch_drafts::hosting::{draft_proof_path, is_issued_proof};
use vouch_drafts::sweep::DRAFT_RETENTION_DAYS;
use vouch_drafts::{DraftRepository, PublishError, host_inline_proof};
use vouch_types::api::{ActiveDraftQuery, Claims, SaveDraftRequest, StaleDraftQuery};
use vouch_types::{NewDraft, ProofPayload};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::with_db;

/// GET /drafts: the caller's active drafts, most recently updated first.
pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let drafts = with_db(&state.db, move |db| db.list_drafts(claims.sub))
        .await
        .map_err(|e| {
            error!("DB list_drafts error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(drafts))
}

/// GET /drafts/active?listing_id=: the draft or `null`.
pub async fn active_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ActiveDraftQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let draft = state
        .store
        .find_active_draft(&query.listing_id, claims.sub)
        .await
        .map_err(|e| {
            error!("find_active_draft error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(draft))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(draft_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let draft = state
        .store
        .get_draft(draft_id)
        .await
        .map_err(|e| {
            error!("get_draft error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .filter(|d| d.author_id == claims.sub)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(draft))
}

/// PUT /drafts: upsert the caller's draft for a listing. Inline proofs are
/// hosted before the row is written.
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = claims.sub;
    if let Some(rating) = req.fields.rating {
        if !(1..=5).contains(&rating) {
            return Err(PublishError::InvalidRating(rating).into());
        }
    }

    let owner_id = state
        .store
        .listing_owner(&req.listing_id)
        .await?
        .ok_or(PublishError::ListingNotFound)?;

    let existing_path = state
        .store
        .find_active_draft(&req.listing_id, author_id)
        .await?
        .and_then(|d| d.proof_file_name);

    let mut uploaded = None;
    let (proof_url, proof_kind, proof_file_name) = match &req.fields.proof {
        None => (None, None, None),
        Some(ProofPayload::Pointer { .. }) => return Err(PublishError::UnresolvedProof.into()),
        Some(ProofPayload::Hosted { url, media_kind }) => {
            // the url must be one this store issued for the caller's proof
            let path = req
                .proof_file_name
                .iter()
                .chain(existing_path.iter())
                .find(|path| is_issued_proof(state.objects.as_ref(), url, path, owner_id, author_id))
                .cloned()
                .ok_or_else(|| PublishError::InvalidProof(format!("{} is not this draft's hosted proof", url)))?;
            (Some(url.clone()), Some(*media_kind), Some(path))
        }
        Some(inline) => {
            let now = Utc::now();
            let hosted = host_inline_proof(state.objects.as_ref(), inline, |ext| {
                draft_proof_path(owner_id, author_id, now, ext)
            })
            .await
            .map_err(PublishError::from)?;
            uploaded = Some(hosted.path.clone());
            (Some(hosted.url), Some(hosted.media_kind), Some(hosted.path))
        }
    };

    let new_draft = NewDraft {
        listing_id: req.listing_id,
        author_id,
        rating: req.fields.rating,
        body_text: req.fields.body_text,
        experience_date: req.fields.experience_date,
        proof_url,
        proof_kind,
        proof_file_name,
        updated_at: Utc::now(),
    };

    let draft = match state.store.upsert_draft(&new_draft).await {
        Ok(draft) => draft,
        Err(e) => {
            if let Some(path) = uploaded.filter(|path| existing_path.as_ref() != Some(path)) {
                remove_proof(&state, &path).await;
            }
            return Err(e.into());
        }
    };

    // the replaced proof is no longer referenced by any row
    if let Some(old) = existing_path.filter(|old| draft.proof_file_name.as_ref() != Some(old)) {
        remove_proof(&state, &old).await;
    }
    Ok(Json(draft))
}

async fn remove_proof(state: &AppState, path: &str) {
    if let Err(e) = state.objects.remove(path).await {
        warn!("Failed to delete proof object {}: {}", path, e);
    }
}

/// DELETE /drafts/{id}: discard: proof object first, then the row.
pub async fn discard_draft(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(draft_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.publisher.discard(draft_id, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /drafts/stale?before=: remove the caller's drafts not updated
/// since `before` (default: the retention window) and return them.
pub async fn sweep_stale(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StaleDraftQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let cutoff = query
        .before
        .unwrap_or_else(|| Utc::now() - Duration::days(DRAFT_RETENTION_DAYS));

    let author_id = claims.sub;
    let removed = with_db(&state.db, move |db| db.delete_stale_drafts(Some(author_id), cutoff))
        .await
        .map_err(|e| {
            error!("DB delete_stale_drafts error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !removed.is_empty() {
        info!("Removed {} stale drafts for {}", removed.len(), author_id);
    }
    Ok(Json(removed))
}
