use thiserror::Error;
use uuid::Uuid;

use crate::models::EditScope;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Invalid recurrence configuration: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Task {0} is not part of a recurring series")]
    NotRecurring(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to apply '{scope}' scope to task {task_id}: {source}")]
    ScopeFailed {
        scope: EditScope,
        task_id: Uuid,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRRule(String),
}

impl CoreError {
    /// Maps a unique-constraint violation to `Conflict`, leaving other errors untouched.
    pub(crate) fn from_insert(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CoreError::Conflict(what())
            }
            _ => CoreError::Database(err),
        }
    }

    /// Strips a `ScopeFailed` wrapper, returning the underlying cause.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::ScopeFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
