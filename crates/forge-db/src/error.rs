use forge_types::models::PostStatus;
use rusqlite::ffi;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// A value the schema cannot represent faithfully.
    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("illegal post transition {from} -> {to}")]
    IllegalTransition { from: PostStatus, to: PostStatus },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err {
            let detail = msg.clone().unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Conflict(detail);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return StoreError::MissingReference(detail);
                }
                _ => {}
            }
        }
        StoreError::Sqlite(err)
    }
}
