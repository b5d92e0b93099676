use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored column could not be decoded into its domain type.
    #[error("Corrupt row for '{id}': {reason}")]
    CorruptRow { id: String, reason: String },

    /// A state transition was attempted from a state the row is not in.
    #[error("Job {id} cannot move to '{to}' (expected status '{expected}')")]
    InvalidTransition {
        id: String,
        expected: String,
        to: String,
    },

    #[error("Blocking database task failed: {0}")]
    Join(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}
