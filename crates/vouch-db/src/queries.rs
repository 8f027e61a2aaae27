use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use vouch_types::{AccountType, AuthorProfile, Draft, Listing, NewDraft, NewReview, Review};

use crate::models::{
    DraftRow, ListingRow, ReviewRow, UserRow, format_date, format_ts, parse_ts,
};
use crate::{Database, Result};

const DRAFT_COLUMNS: &str = "id, listing_id, author_id, rating, body_text, experience_date, \
     proof_url, proof_kind, proof_file_name, status, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, listing_id, owner_id, author_id, rating, body_text, \
     experience_date, proof_url, proof_kind, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        account_type: AccountType,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, account_type, verified, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    id.to_string(),
                    email,
                    password_hash,
                    account_type.as_str(),
                    format_ts(Utc::now())
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn author_profile(&self, id: Uuid) -> Result<Option<AuthorProfile>> {
        self.get_user_by_id(id)?.map(|row| row.profile()).transpose()
    }

    /// Returns false when no such user exists.
    pub fn set_verified(&self, id: Uuid, verified: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET verified = ?1 WHERE id = ?2",
                params![verified, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Listings --

    pub fn create_listing(&self, id: &str, owner_id: Uuid, name: &str) -> Result<Listing> {
        let created_at = Utc::now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO listings (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, owner_id.to_string(), name, format_ts(created_at)],
            )?;
            Ok(())
        })?;

        self.get_listing(id)?
            .ok_or_else(|| crate::DbError::Corrupt(format!("listing {} vanished after insert", id)))
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner_id, name, created_at FROM listings WHERE id = ?1",
                [id],
                |row| {
                    Ok(ListingRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })?;
        row.map(Listing::try_from).transpose()
    }

    // -- Drafts --

    /// Insert or update the active draft for (listing, author).
    ///
    /// The partial unique index `idx_drafts_active` is the conflict target, so
    /// two concurrent saves converge on one row instead of racing a pre-check.
    pub fn upsert_draft(&self, draft: &NewDraft) -> Result<Draft> {
        let row = self.with_conn_mut(|conn| {
            let now = format_ts(draft.updated_at);
            conn.execute(
                "INSERT INTO drafts (id, listing_id, author_id, rating, body_text, experience_date,
                                     proof_url, proof_kind, proof_file_name, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'draft', ?10, ?10)
                 ON CONFLICT(listing_id, author_id) WHERE status = 'draft' DO UPDATE SET
                     rating = excluded.rating,
                     body_text = excluded.body_text,
                     experience_date = excluded.experience_date,
                     proof_url = excluded.proof_url,
                     proof_kind = excluded.proof_kind,
                     proof_file_name = excluded.proof_file_name,
                     updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    &draft.listing_id,
                    draft.author_id.to_string(),
                    draft.rating,
                    &draft.body_text,
                    draft.experience_date.map(format_date),
                    &draft.proof_url,
                    draft.proof_kind.map(|k| k.as_str()),
                    &draft.proof_file_name,
                    now,
                ],
            )?;

            query_active_draft(conn, &draft.listing_id, &draft.author_id.to_string())
        })?;

        row.ok_or_else(|| {
            crate::DbError::Corrupt(format!(
                "active draft for {} / {} vanished after upsert",
                draft.listing_id, draft.author_id
            ))
        })?
        .try_into()
    }

    pub fn find_active_draft(&self, listing_id: &str, author_id: Uuid) -> Result<Option<Draft>> {
        self.with_conn(|conn| query_active_draft(conn, listing_id, &author_id.to_string()))?
            .map(Draft::try_from)
            .transpose()
    }

    pub fn get_draft(&self, id: Uuid) -> Result<Option<Draft>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM drafts WHERE id = ?1", DRAFT_COLUMNS),
                [id.to_string()],
                draft_row,
            )
            .optional()
        })?;
        row.map(Draft::try_from).transpose()
    }

    pub fn list_drafts(&self, author_id: Uuid) -> Result<Vec<Draft>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM drafts WHERE author_id = ?1 AND status = 'draft'
                 ORDER BY updated_at DESC",
                DRAFT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([author_id.to_string()], draft_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Draft::try_from).collect()
    }

    pub fn delete_draft(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM drafts WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Delete active drafts last updated before `cutoff`, for one author or for
    /// everyone. Returns the deleted rows so callers can clean up proof objects.
    pub fn delete_stale_drafts(
        &self,
        author_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Draft>> {
        let rows = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let cutoff = format_ts(cutoff);
            let author = author_id.map(|id| id.to_string());

            let rows = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {} FROM drafts
                     WHERE status = 'draft' AND updated_at < ?1
                       AND (?2 IS NULL OR author_id = ?2)",
                    DRAFT_COLUMNS
                ))?;
                stmt.query_map(params![cutoff, author], draft_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            for row in &rows {
                tx.execute("DELETE FROM drafts WHERE id = ?1", [&row.id])?;
            }
            tx.commit()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Draft::try_from).collect()
    }

    // -- Reviews --

    pub fn review_exists(&self, owner_id: Uuid, author_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reviews WHERE owner_id = ?1 AND author_id = ?2",
                params![owner_id.to_string(), author_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Fails with [`crate::DbError::Conflict`] when the author already reviewed this owner.
    pub fn insert_review(&self, review: &NewReview) -> Result<Review> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO reviews ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    REVIEW_COLUMNS
                ),
                params![
                    id.to_string(),
                    &review.listing_id,
                    review.owner_id.to_string(),
                    review.author_id.to_string(),
                    review.rating,
                    &review.body_text,
                    format_date(review.experience_date),
                    &review.proof_url,
                    review.proof_kind.as_str(),
                    format_ts(review.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(Review {
            id,
            listing_id: review.listing_id.clone(),
            owner_id: review.owner_id,
            author_id: review.author_id,
            rating: review.rating,
            body_text: review.body_text.clone(),
            experience_date: review.experience_date,
            proof_url: review.proof_url.clone(),
            proof_kind: review.proof_kind,
            created_at: review.created_at,
        })
    }

    pub fn list_reviews(&self, listing_id: &str) -> Result<Vec<Review>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM reviews WHERE listing_id = ?1 ORDER BY created_at DESC",
                REVIEW_COLUMNS
            ))?;
            let rows = stmt
                .query_map([listing_id], |row| {
                    Ok(ReviewRow {
                        id: row.get(0)?,
                        listing_id: row.get(1)?,
                        owner_id: row.get(2)?,
                        author_id: row.get(3)?,
                        rating: row.get(4)?,
                        body_text: row.get(5)?,
                        experience_date: row.get(6)?,
                        proof_url: row.get(7)?,
                        proof_kind: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Review::try_from).collect()
    }

    // -- Scratch --

    pub fn put_scratch(&self, id: &str, data: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO scratch (id, data, expires_at) VALUES (?1, ?2, ?3)",
                params![id, data, format_ts(expires_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_scratch(&self, id: &str) -> Result<Option<(String, DateTime<Utc>)>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT data, expires_at FROM scratch WHERE id = ?1",
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
        })?;

        match row {
            Some((data, expires_at)) => Ok(Some((data, parse_ts(&expires_at)?))),
            None => Ok(None),
        }
    }

    pub fn delete_scratch(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM scratch WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Remove entries whose expiry is at or before `now`.
    pub fn delete_expired_scratch(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed =
                conn.execute("DELETE FROM scratch WHERE expires_at <= ?1", [format_ts(now)])?;
            Ok(removed)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, account_type, verified, created_at FROM users WHERE {} = ?1",
        column
    ))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            account_type: row.get(3)?,
            verified: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn query_active_draft(conn: &Connection, listing_id: &str, author_id: &str) -> Result<Option<DraftRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM drafts WHERE listing_id = ?1 AND author_id = ?2 AND status = 'draft'",
            DRAFT_COLUMNS
        ),
        [listing_id, author_id],
        draft_row,
    )
    .optional()
}

fn draft_row(row: &Row<'_>) -> rusqlite::Result<DraftRow> {
    Ok(DraftRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        author_id: row.get(2)?,
        rating: row.get(3)?,
        body_text: row.get(4)?,
        experience_date: row.get(5)?,
        proof_url: row.get(6)?,
        proof_kind: row.get(7)?,
        proof_file_name: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
