use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use vouch_drafts::{CookieChannel, CookieError, DraftRepository, ObjectStore, StoreError};
use vouch_types::api::{
    CookieValueResponse, ErrorBody, LoginRequest, LoginResponse, ObjectUploadResponse,
    PublishRequest, RegisterRequest, RegisterResponse, SaveDraftRequest, SessionResponse,
    SetCookieRequest,
};
use vouch_types::{AccountType, Draft, DraftFields, Listing, NewDraft, Review};

use crate::error::ClientError;

/// Authenticated identity held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}

/// HTTP client for the vouch server. Keeps its own cookie jar, so it stands
/// in for a browser profile.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: RwLock<Option<Session>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    pub fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let session = self.session().ok_or(ClientError::NotAuthenticated)?;
        Ok(req.bearer_auth(session.token))
    }

    // -- Auth --

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        account_type: AccountType,
    ) -> Result<Session, ClientError> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            account_type: Some(account_type),
        };
        let resp: RegisterResponse = json(self.http.post(self.url("/auth/register")).json(&body)).await?;

        let session = Session {
            user_id: resp.user_id,
            token: resp.token,
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = json(self.http.post(self.url("/auth/login")).json(&body)).await?;

        let session = Session {
            user_id: resp.user_id,
            token: resp.token,
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    pub fn logout(&self) {
        self.set_session(None);
    }

    pub async fn current_profile(&self) -> Result<SessionResponse, ClientError> {
        json(self.authed(self.http.get(self.url("/auth/session")))?).await
    }

    // -- Drafts and reviews --

    pub async fn save_draft(&self, req: &SaveDraftRequest) -> Result<Draft, ClientError> {
        json(self.authed(self.http.put(self.url("/drafts")).json(req))?).await
    }

    pub async fn list_drafts(&self) -> Result<Vec<Draft>, ClientError> {
        json(self.authed(self.http.get(self.url("/drafts")))?).await
    }

    pub async fn discard(&self, draft_id: Uuid) -> Result<(), ClientError> {
        let req = self.authed(self.http.delete(self.url(&format!("/drafts/{}", draft_id))))?;
        check(req.send().await?).await?;
        Ok(())
    }

    pub async fn publish(&self, req: &PublishRequest) -> Result<Review, ClientError> {
        json(self.authed(self.http.post(self.url("/reviews")).json(req))?).await
    }

    /// The signed-in author's active draft for a listing.
    pub async fn active_draft(&self, listing_id: &str) -> Result<Option<Draft>, ClientError> {
        let req = self
            .authed(self.http.get(self.url("/drafts/active")))?
            .query(&[("listing_id", listing_id)]);
        json(req).await
    }

    pub async fn listing(&self, listing_id: &str) -> Result<Option<Listing>, ClientError> {
        optional(self.http.get(self.url(&format!("/listings/{}", listing_id)))).await
    }

    pub async fn reviews(&self, listing_id: &str) -> Result<Vec<Review>, ClientError> {
        json(self.http.get(self.url(&format!("/listings/{}/reviews", listing_id)))).await
    }
}

/// Turn a non-success response into a [`ClientError`].
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = status.as_u16();
    match resp.json::<ErrorBody>().await {
        Ok(body) => Err(ClientError::Api {
            status: code,
            code: body.error,
            message: body.message,
        }),
        Err(_) => Err(ClientError::Status(code)),
    }
}

async fn json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let resp = check(req.send().await?).await?;
    Ok(resp.json().await?)
}

/// Like [`json`], but a 404 is `None`.
async fn optional<T: DeserializeOwned>(req: RequestBuilder) -> Result<Option<T>, ClientError> {
    let resp = req.send().await?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    Ok(Some(check(resp).await?.json().await?))
}

fn transport(e: impl std::fmt::Display) -> CookieError {
    CookieError::Transport(e.to_string())
}

#[async_trait]
impl CookieChannel for ApiClient {
    async fn get(&self, name: &str) -> Result<Option<Value>, CookieError> {
        let resp = self
            .http
            .get(self.url("/api/cookies"))
            .query(&[("name", name)])
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(CookieError::Rejected(resp.status().as_u16()));
        }
        let body: CookieValueResponse = resp.json().await.map_err(transport)?;
        Ok(body.value)
    }

    async fn set(&self, name: &str, value: &Value, expires_days: u32) -> Result<(), CookieError> {
        let body = SetCookieRequest {
            name: name.to_string(),
            value: value.clone(),
            expires_days,
        };
        let resp = self
            .http
            .post(self.url("/api/cookies"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(CookieError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CookieError> {
        let resp = self
            .http
            .delete(self.url("/api/cookies"))
            .query(&[("name", name)])
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(CookieError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftRepository for ApiClient {
    async fn listing_owner(&self, listing_id: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self.listing(listing_id).await?.map(|l| l.owner_id))
    }

    async fn find_active_draft(&self, listing_id: &str, _author_id: Uuid) -> Result<Option<Draft>, StoreError> {
        Ok(self.active_draft(listing_id).await?)
    }

    async fn get_draft(&self, id: Uuid) -> Result<Option<Draft>, StoreError> {
        let req = self.authed(self.http.get(self.url(&format!("/drafts/{}", id))))?;
        Ok(optional(req).await?)
    }

    async fn upsert_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError> {
        if self.session().map(|s| s.user_id) != Some(draft.author_id) {
            return Err(StoreError::Backend("draft author is not the signed-in user".into()));
        }

        let proof = match (&draft.proof_url, draft.proof_kind) {
            (Some(url), Some(media_kind)) => Some(vouch_types::ProofPayload::Hosted {
                url: url.clone(),
                media_kind,
            }),
            _ => None,
        };
        let req = SaveDraftRequest {
            listing_id: draft.listing_id.clone(),
            fields: DraftFields {
                rating: draft.rating,
                body_text: draft.body_text.clone(),
                experience_date: draft.experience_date,
                proof,
            },
            proof_file_name: draft.proof_file_name.clone(),
        };
        Ok(self.save_draft(&req).await?)
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, StoreError> {
        match self.discard(id).await {
            Ok(()) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_stale_drafts(&self, _author_id: Uuid, cutoff: DateTime<Utc>) -> Result<Vec<Draft>, StoreError> {
        let before = cutoff.to_rfc3339_opts(SecondsFormat::Millis, true);
        let req = self
            .authed(self.http.delete(self.url("/drafts/stale")))?
            .query(&[("before", before)]);
        Ok(json(req).await?)
    }
}

#[async_trait]
impl ObjectStore for ApiClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        debug!("Uploading {} ({} bytes)", path, bytes.len());
        let req = self
            .authed(self.http.put(self.url(&format!("/objects/{}", path))))?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let resp: ObjectUploadResponse = json(req).await?;
        Ok(resp.url)
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&format!("/objects/{}", path))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let req = self.authed(self.http.delete(self.url(&format!("/objects/{}", path))))?;
        check(req.send().await.map_err(ClientError::from)?).await?;
        Ok(())
    }
}
