use thiserror::Error;

use super::HistoryId;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Error, Debug)]
pub enum HistoryError {
    /// The backing store failed. Passed through untouched, never retried here.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("history item {0} not found")]
    NotFound(HistoryId),

    /// The blocking worker panicked or the connection lock was poisoned.
    #[error("storage worker failed: {0}")]
    Worker(String),
}

impl HistoryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, HistoryError::NotFound(_))
    }
}
