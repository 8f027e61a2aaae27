use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use vouch_types::AccountType;
use vouch_types::api::{Claims, CreateListingRequest};

use crate::state::AppState;
use crate::store::with_db;

/// POST /listings: business accounts only.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.len() > 200 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let owner_id = claims.sub;
    let profile = with_db(&state.db, move |db| db.author_profile(owner_id))
        .await
        .map_err(|e| {
            error!("DB author_profile error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if profile.account_type != AccountType::Business {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = Uuid::new_v4().to_string();
    let listing = with_db(&state.db, move |db| db.create_listing(&id, owner_id, &name))
        .await
        .map_err(|e| {
            error!("DB create_listing error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("Listing {} created by {}", listing.id, owner_id);
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let listing = with_db(&state.db, move |db| db.get_listing(&listing_id))
        .await
        .map_err(|e| {
            error!("DB get_listing error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(listing))
}

/// GET /listings/{id}/reviews: newest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let reviews = with_db(&state.db, move |db| db.list_reviews(&listing_id))
        .await
        .map_err(|e| {
            error!("DB list_reviews error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(reviews))
}
