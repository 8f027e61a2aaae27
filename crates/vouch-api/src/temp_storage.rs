use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::error;

use vouch_types::api::{TempFetchResponse, TempQuery, TempStoreRequest, TempStoreResponse};

use crate::scratch::{SCRATCH_TTL_HOURS, ScratchLookup};
use crate::state::AppState;

/// POST /api/temp-storage: hold `data` for 24 hours.
pub async fn store(
    State(state): State<AppState>,
    Json(req): Json<TempStoreRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let expires_at = Utc::now() + Duration::hours(SCRATCH_TTL_HOURS);
    let storage_id = state.scratch.put(req.data, expires_at).await.map_err(|e| {
        error!("Scratch put error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(TempStoreResponse {
        success: true,
        storage_id,
    }))
}

/// GET /api/temp-storage?id=: 404 when unknown, 410 once expired.
pub async fn fetch(
    State(state): State<AppState>,
    Query(query): Query<TempQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = query.id.filter(|id| !id.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;

    let lookup = state.scratch.get(&id, Utc::now()).await.map_err(|e| {
        error!("Scratch get error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match lookup {
        ScratchLookup::Found(data) => Ok(Json(TempFetchResponse {
            success: true,
            data,
        })),
        ScratchLookup::Expired => Err(StatusCode::GONE),
        ScratchLookup::Missing => Err(StatusCode::NOT_FOUND),
    }
}
