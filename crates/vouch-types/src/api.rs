use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AccountType, DraftFields};

/// Days a cookie lives when the caller does not say.
pub const DEFAULT_COOKIE_DAYS: u32 = 7;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub account_type: AccountType,
    pub verified: bool,
}

// -- Listings --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    pub name: String,
}

// -- Drafts and reviews --

/// Durable-tier save. An inline proof is hosted by the server before the upsert;
/// a hosted proof may name the object path it lives at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDraftRequest {
    pub listing_id: String,
    #[serde(flatten)]
    pub fields: DraftFields,
    #[serde(default)]
    pub proof_file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub listing_id: String,
    #[serde(flatten)]
    pub fields: DraftFields,
}

#[derive(Debug, Deserialize)]
pub struct ActiveDraftQuery {
    pub listing_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StaleDraftQuery {
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// -- Objects --

#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectUploadResponse {
    pub path: String,
    pub url: String,
}

// -- Cookie channel --

#[derive(Debug, Deserialize)]
pub struct CookieQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CookieValueResponse {
    pub value: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetCookieRequest {
    pub name: String,
    pub value: Value,
    #[serde(default = "default_cookie_days", alias = "expiresDays")]
    pub expires_days: u32,
}

fn default_cookie_days() -> u32 {
    DEFAULT_COOKIE_DAYS
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// -- Temp storage --

#[derive(Debug, Serialize, Deserialize)]
pub struct TempStoreRequest {
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TempStoreResponse {
    pub success: bool,
    #[serde(alias = "storageId")]
    pub storage_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TempQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TempFetchResponse {
    pub success: bool,
    pub data: Value,
}
