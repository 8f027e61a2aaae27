use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use vouch_types::proof::extension_for_mime;
use vouch_types::{MediaKind, ProofError, ProofPayload};

use crate::repository::{ObjectStore, StoreError};

pub const DRAFT_PROOF_PREFIX: &str = "draftReviews";
pub const REVIEW_PROOF_PREFIX: &str = "reviews";

#[derive(Debug, Error)]
pub enum ProofUploadError {
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error("upload failed: {0}")]
    Store(#[from] StoreError),
}

/// A proof that now lives in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedProof {
    pub url: String,
    pub media_kind: MediaKind,
    pub path: String,
}

impl HostedProof {
    pub fn payload(&self) -> ProofPayload {
        ProofPayload::Hosted {
            url: self.url.clone(),
            media_kind: self.media_kind,
        }
    }
}

/// `draftReviews/{owner}/draft_{author}_{ms}.{ext}`
pub fn draft_proof_path(owner_id: Uuid, author_id: Uuid, now: DateTime<Utc>, ext: &str) -> String {
    format!(
        "{}/{}/draft_{}_{}.{}",
        DRAFT_PROOF_PREFIX,
        owner_id,
        author_id,
        now.timestamp_millis(),
        ext
    )
}

/// `reviews/{owner}/review_{author}_{ms}.{ext}`
pub fn review_proof_path(owner_id: Uuid, author_id: Uuid, now: DateTime<Utc>, ext: &str) -> String {
    format!(
        "{}/{}/review_{}_{}.{}",
        REVIEW_PROOF_PREFIX,
        owner_id,
        author_id,
        now.timestamp_millis(),
        ext
    )
}

/// True when `path` names one of this author's proofs for `owner_id`,
/// either a draft proof or a published one.
pub fn is_author_proof_path(path: &str, owner_id: Uuid, author_id: Uuid) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    let [prefix, owner, file_name] = segments.as_slice() else {
        return false;
    };
    if *owner != owner_id.to_string() {
        return false;
    }
    match *prefix {
        DRAFT_PROOF_PREFIX => file_name.starts_with(&format!("draft_{}_", author_id)),
        REVIEW_PROOF_PREFIX => file_name.starts_with(&format!("review_{}_", author_id)),
        _ => false,
    }
}

/// Whether `url` is the address the store issued for `path`, and `path`
/// belongs to this author's proofs on `owner_id`'s listing.
pub fn is_issued_proof(objects: &dyn ObjectStore, url: &str, path: &str, owner_id: Uuid, author_id: Uuid) -> bool {
    is_author_proof_path(path, owner_id, author_id) && objects.public_url(path) == url
}

/// Decode an inline proof and upload it to the path chosen by `path_for`
/// (which receives the file extension).
pub async fn host_inline_proof(
    objects: &dyn ObjectStore,
    proof: &ProofPayload,
    path_for: impl FnOnce(&str) -> String,
) -> Result<HostedProof, ProofUploadError> {
    let (mime, bytes) = proof.decode()?;
    let media_kind = MediaKind::from_mime(mime).ok_or_else(|| ProofError::UnsupportedMime(mime.to_string()))?;

    let path = path_for(extension_for_mime(mime));
    let url = objects.upload(&path, bytes, mime).await?;
    Ok(HostedProof { url, media_kind, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn proof_paths_follow_layout() {
        let owner = Uuid::nil();
        let author = Uuid::from_u128(7);
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        assert_eq!(
            draft_proof_path(owner, author, now, "png"),
            format!("draftReviews/{}/draft_{}_1700000000123.png", owner, author)
        );
        assert_eq!(
            review_proof_path(owner, author, now, "mp4"),
            format!("reviews/{}/review_{}_1700000000123.mp4", owner, author)
        );
    }

    #[test]
    fn author_proof_paths() {
        let owner = Uuid::from_u128(1);
        let author = Uuid::from_u128(2);
        let other = Uuid::from_u128(3);
        let now = Utc::now();

        assert!(is_author_proof_path(&draft_proof_path(owner, author, now, "png"), owner, author));
        assert!(is_author_proof_path(&review_proof_path(owner, author, now, "mp4"), owner, author));

        // someone else's proof, or the right file under another listing owner
        assert!(!is_author_proof_path(&draft_proof_path(owner, other, now, "png"), owner, author));
        assert!(!is_author_proof_path(&draft_proof_path(other, author, now, "png"), owner, author));

        // prefix and file name must agree, and nothing may hide in extra segments
        assert!(!is_author_proof_path(
            &format!("reviews/{}/draft_{}_1.png", owner, author),
            owner,
            author
        ));
        assert!(!is_author_proof_path(
            &format!("draftReviews/{}/../x/draft_{}_1.png", owner, author),
            owner,
            author
        ));
        assert!(!is_author_proof_path("https://anywhere.example/not-a-proof", owner, author));
    }
}
