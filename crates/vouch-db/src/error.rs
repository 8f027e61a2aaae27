use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && [
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                    ]
                    .contains(&code.extended_code) =>
            {
                DbError::Conflict(msg.clone().unwrap_or_else(|| "unique constraint".into()))
            }
            _ => DbError::Sqlite(err),
        }
    }
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}
