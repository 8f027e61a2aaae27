//! Database row types: these map directly to SQLite rows.
//! Distinct from vouch-types domain models to keep the DB layer independent;
//! conversions report unparsable columns as [`DbError::Corrupt`].

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use vouch_types::{AccountType, AuthorProfile, Draft, Listing, Review};

use crate::{DbError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamps are stored as fixed-width RFC 3339 with milliseconds so that
/// lexical order in SQL matches chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| DbError::Corrupt(format!("date '{}': {}", raw, e)))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| DbError::Corrupt(format!("uuid '{}': {}", raw, e)))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(DbError::Corrupt)
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub account_type: String,
    pub verified: bool,
    pub created_at: String,
}

impl UserRow {
    pub fn profile(&self) -> Result<AuthorProfile> {
        Ok(AuthorProfile {
            id: parse_uuid(&self.id)?,
            email: self.email.clone(),
            account_type: parse_enum(&self.account_type)?,
            verified: self.verified,
        })
    }

    pub fn account_type(&self) -> Result<AccountType> {
        parse_enum(&self.account_type)
    }
}

pub struct ListingRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: String,
}

impl TryFrom<ListingRow> for Listing {
    type Error = DbError;

    fn try_from(row: ListingRow) -> Result<Self> {
        Ok(Listing {
            owner_id: parse_uuid(&row.owner_id)?,
            created_at: parse_ts(&row.created_at)?,
            id: row.id,
            name: row.name,
        })
    }
}

pub struct DraftRow {
    pub id: String,
    pub listing_id: String,
    pub author_id: String,
    pub rating: Option<u8>,
    pub body_text: Option<String>,
    pub experience_date: Option<String>,
    pub proof_url: Option<String>,
    pub proof_kind: Option<String>,
    pub proof_file_name: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<DraftRow> for Draft {
    type Error = DbError;

    fn try_from(row: DraftRow) -> Result<Self> {
        Ok(Draft {
            id: parse_uuid(&row.id)?,
            author_id: parse_uuid(&row.author_id)?,
            experience_date: row.experience_date.as_deref().map(parse_date).transpose()?,
            proof_kind: row.proof_kind.as_deref().map(parse_enum).transpose()?,
            status: parse_enum(&row.status)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            listing_id: row.listing_id,
            rating: row.rating,
            body_text: row.body_text,
            proof_url: row.proof_url,
            proof_file_name: row.proof_file_name,
        })
    }
}

pub struct ReviewRow {
    pub id: String,
    pub listing_id: String,
    pub owner_id: String,
    pub author_id: String,
    pub rating: u8,
    pub body_text: String,
    pub experience_date: String,
    pub proof_url: String,
    pub proof_kind: String,
    pub created_at: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = DbError;

    fn try_from(row: ReviewRow) -> Result<Self> {
        Ok(Review {
            id: parse_uuid(&row.id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            author_id: parse_uuid(&row.author_id)?,
            experience_date: parse_date(&row.experience_date)?,
            proof_kind: parse_enum(&row.proof_kind)?,
            created_at: parse_ts(&row.created_at)?,
            listing_id: row.listing_id,
            rating: row.rating,
            body_text: row.body_text,
            proof_url: row.proof_url,
        })
    }
}
