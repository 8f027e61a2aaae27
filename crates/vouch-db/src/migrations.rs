use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (accounts, listings, drafts, reviews)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                account_type  TEXT NOT NULL DEFAULT 'customer',
                verified      INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE listings (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE drafts (
                id               TEXT PRIMARY KEY,
                listing_id       TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                author_id        TEXT NOT NULL REFERENCES users(id),
                rating           INTEGER,
                body_text        TEXT,
                experience_date  TEXT,
                proof_url        TEXT,
                proof_kind       TEXT,
                proof_file_name  TEXT,
                status           TEXT NOT NULL DEFAULT 'draft',
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            -- One active draft per (listing, author); upserts target this index.
            CREATE UNIQUE INDEX idx_drafts_active
                ON drafts(listing_id, author_id) WHERE status = 'draft';

            CREATE INDEX idx_drafts_author_updated
                ON drafts(author_id, updated_at);

            CREATE TABLE reviews (
                id               TEXT PRIMARY KEY,
                listing_id       TEXT NOT NULL REFERENCES listings(id),
                owner_id         TEXT NOT NULL REFERENCES users(id),
                author_id        TEXT NOT NULL REFERENCES users(id),
                rating           INTEGER NOT NULL,
                body_text        TEXT NOT NULL,
                experience_date  TEXT NOT NULL,
                proof_url        TEXT NOT NULL,
                proof_kind       TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                UNIQUE(owner_id, author_id)
            );

            CREATE INDEX idx_reviews_listing
                ON reviews(listing_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (scratch storage)");
        conn.execute_batch(
            "
            CREATE TABLE scratch (
                id          TEXT PRIMARY KEY,
                data        TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_scratch_expires ON scratch(expires_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
