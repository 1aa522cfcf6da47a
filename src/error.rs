//! Error taxonomy for the shift ledger.
//!
//! Three failure classes cross the API boundary:
//! - [`LedgerError::Validation`] — bad operator input; nothing was changed.
//! - [`LedgerError::NotFound`] — the referenced record does not exist.
//! - [`LedgerError::Transaction`] — the store rejected an atomic write; the
//!   whole operation rolled back and must be retried by the operator.
//!
//! Pure computations (window selection, summary calculation) are total and
//! never produce these.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Invalid operator input. The operation was aborted before any write.
    #[error("{0}")]
    Validation(String),

    /// A referenced record is absent from the store.
    #[error("{0}")]
    NotFound(String),

    /// An atomic write failed and was rolled back. Never partially applied;
    /// the operator must re-invoke the whole close/reopen.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Transaction(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Transaction(format!("snapshot encode/decode: {e}"))
    }
}
