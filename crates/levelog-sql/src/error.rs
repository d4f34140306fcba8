//! Query errors seen by the logging adapter

use thiserror::Error;

/// Failure of one database operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query ran but matched no row.
    #[error("record not found")]
    RecordNotFound,

    #[error(transparent)]
    Sqlite(rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound)
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::RecordNotFound,
            other => Self::Sqlite(other),
        }
    }
}
