use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use vouch_drafts::{ObjectStore, StoreError};
use vouch_types::api::ObjectUploadResponse;
use vouch_types::proof::mime_for_extension;

use crate::middleware::extract_claims;
use crate::state::AppState;

/// 50 MB upload limit for proof media
pub const MAX_OBJECT_SIZE: usize = 50 * 1024 * 1024;

/// Proof media on local disk, laid out as `{dir}/{path}` and served publicly
/// under `{public_url}/objects/{path}`.
pub struct FsObjectStore {
    dir: PathBuf,
    public_url: String,
}

impl FsObjectStore {
    pub async fn new(dir: PathBuf, public_url: impl Into<String>) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Object storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Map an object path to disk. Rejects anything that could leave the
    /// storage directory.
    pub fn file_path(&self, path: &str) -> Option<PathBuf> {
        if path.is_empty() || path.len() > 512 || path.contains('\\') {
            return None;
        }
        let mut full = self.dir.clone();
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return None;
            }
            full.push(segment);
        }
        Some(full)
    }

    pub async fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.file_path(path).ok_or_else(|| invalid_path(path))?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await
    }

    pub async fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let full = self.file_path(path).ok_or_else(|| invalid_path(path))?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an object. A missing object is not an error.
    pub async fn remove(&self, path: &str) -> io::Result<()> {
        let full = self.file_path(path).ok_or_else(|| invalid_path(path))?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                info!("Deleted object {}", path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Object {} already gone", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn invalid_path(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid object path '{}'", path))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, StoreError> {
        self.write(path, &bytes).await.map_err(StoreError::backend)?;
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/objects/{}", self.public_url, path)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.remove(path).await.map_err(StoreError::backend)
    }
}

/// Authors may only write proofs named after themselves.
pub fn owns_path(path: &str, user_id: Uuid) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.starts_with(&format!("draft_{}_", user_id))
        || file_name.starts_with(&format!("review_{}_", user_id))
}

/// PUT /objects/{*path}: raw bytes, returns `{ path, url }`.
pub async fn put_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    let claims = extract_claims(&headers, &state.jwt_secret)?;

    if state.objects.file_path(&path).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !owns_path(&path, claims.sub) {
        return Err(StatusCode::FORBIDDEN);
    }
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if bytes.len() > MAX_OBJECT_SIZE {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    state.objects.write(&path, &bytes).await.map_err(|e| {
        error!("Failed to write object {}: {}", path, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let url = state.objects.public_url(&path);
    Ok((StatusCode::CREATED, Json(ObjectUploadResponse { path, url })))
}

/// GET /objects/{*path}: public read.
pub async fn get_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    if state.objects.file_path(&path).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let bytes = state
        .objects
        .read(&path)
        .await
        .map_err(|e| {
            error!("Failed to read object {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    Ok(([(header::CONTENT_TYPE, mime_for_extension(ext))], bytes))
}

/// DELETE /objects/{*path}: idempotent.
pub async fn delete_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let claims = extract_claims(&headers, &state.jwt_secret)?;

    if state.objects.file_path(&path).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !owns_path(&path, claims.sub) {
        return Err(StatusCode::FORBIDDEN);
    }

    state.objects.remove(&path).await.map_err(|e| {
        error!("Failed to delete object {}: {}", path, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(StatusCode::NO_CONTENT)
}
