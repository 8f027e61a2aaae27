use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::proof::{MediaKind, ProofPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Customer,
    Business,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Business => "business",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "business" => Ok(Self::Business),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

/// Lifecycle state of a durable draft row. Only `Draft` rows count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Pending,
    Published,
}

impl DraftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown draft status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Identity-provider view of an author: only the fields the review flow reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub id: Uuid,
    pub email: String,
    pub account_type: AccountType,
    pub verified: bool,
}

/// The review form state. Every field is optional until publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftFields {
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub experience_date: Option<NaiveDate>,
    #[serde(default)]
    pub proof: Option<ProofPayload>,
}

/// Durable-tier draft row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub listing_id: String,
    pub author_id: Uuid,
    pub rating: Option<u8>,
    pub body_text: Option<String>,
    pub experience_date: Option<NaiveDate>,
    pub proof_url: Option<String>,
    pub proof_kind: Option<MediaKind>,
    /// Object-store path of the hosted proof, kept so discard can remove it.
    pub proof_file_name: Option<String>,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn hosted_proof(&self) -> Option<ProofPayload> {
        match (&self.proof_url, self.proof_kind) {
            (Some(url), Some(media_kind)) => Some(ProofPayload::Hosted {
                url: url.clone(),
                media_kind,
            }),
            _ => None,
        }
    }

    pub fn fields(&self) -> DraftFields {
        DraftFields {
            rating: self.rating,
            body_text: self.body_text.clone(),
            experience_date: self.experience_date,
            proof: self.hosted_proof(),
        }
    }
}

/// Values written by a durable-tier upsert. The row id and `created_at` are
/// kept when an active draft already exists for (listing, author).
#[derive(Debug, Clone, PartialEq)]
pub struct NewDraft {
    pub listing_id: String,
    pub author_id: Uuid,
    pub rating: Option<u8>,
    pub body_text: Option<String>,
    pub experience_date: Option<NaiveDate>,
    pub proof_url: Option<String>,
    pub proof_kind: Option<MediaKind>,
    pub proof_file_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub listing_id: String,
    pub owner_id: Uuid,
    pub author_id: Uuid,
    pub rating: u8,
    pub body_text: String,
    pub experience_date: NaiveDate,
    pub proof_url: String,
    pub proof_kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub listing_id: String,
    pub owner_id: Uuid,
    pub author_id: Uuid,
    pub rating: u8,
    pub body_text: String,
    pub experience_date: NaiveDate,
    pub proof_url: String,
    pub proof_kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [DraftStatus::Draft, DraftStatus::Pending, DraftStatus::Published] {
            assert_eq!(status.as_str().parse::<DraftStatus>().unwrap(), status);
        }
        assert!("archived".parse::<DraftStatus>().is_err());
    }

    #[test]
    fn hosted_proof_needs_url_and_kind() {
        let now = Utc::now();
        let mut draft = Draft {
            id: Uuid::new_v4(),
            listing_id: "L1".into(),
            author_id: Uuid::new_v4(),
            rating: Some(4),
            body_text: None,
            experience_date: None,
            proof_url: Some("http://x/objects/a.png".into()),
            proof_kind: None,
            proof_file_name: None,
            status: DraftStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        assert!(draft.hosted_proof().is_none());

        draft.proof_kind = Some(MediaKind::Image);
        assert_eq!(
            draft.fields().proof,
            Some(ProofPayload::Hosted {
                url: "http://x/objects/a.png".into(),
                media_kind: MediaKind::Image,
            })
        );
    }
}
