use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use vouch_drafts::{ProofUploadError, PublishError, StoreError};
use vouch_types::api::ErrorBody;

/// Errors for routes where the caller needs to tell conditions apart.
/// Rendered as `{ "error": <code>, "message": <text> }`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Publish(PublishError::Store(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Publish(e) => match e {
                PublishError::MissingField(_)
                | PublishError::InvalidRating(_)
                | PublishError::UnresolvedProof
                | PublishError::InvalidProof(_)
                | PublishError::Upload(ProofUploadError::Proof(_)) => StatusCode::BAD_REQUEST,
                PublishError::AccountNotFound => StatusCode::UNAUTHORIZED,
                PublishError::WrongAccountType | PublishError::NotVerified | PublishError::OwnListing => {
                    StatusCode::FORBIDDEN
                }
                PublishError::ListingNotFound | PublishError::DraftNotFound => StatusCode::NOT_FOUND,
                PublishError::AlreadyReviewed => StatusCode::CONFLICT,
                PublishError::Upload(ProofUploadError::Store(_)) => StatusCode::BAD_GATEWAY,
                PublishError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Publish(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
