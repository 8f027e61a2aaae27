use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use vouch_types::api::{Claims, PublishRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /reviews: publish the submitted form as the caller's review.
pub async fn publish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .publisher
        .publish(&req.listing_id, &req.fields, claims.sub)
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}
