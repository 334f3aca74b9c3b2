//! Session-level import errors
//!
//! Per-file problems never leave their stage; they are captured on the
//! file's record. Only these conditions cross a stage boundary.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Raised after the configured number of consecutive network-classified
    /// copy failures. Non-retryable: the session must pause instead of
    /// burning through the remaining file list against a dead share.
    #[error(
        "sustained network failure after {consecutive} consecutive errors (last: {last_error})"
    )]
    NetworkFailure { consecutive: u32, last_error: String },

    #[error("import cancelled")]
    Cancelled,

    #[error("location {0} not found in catalog")]
    LocationNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DbErr),
}
