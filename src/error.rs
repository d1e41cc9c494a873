//! Error types for folio.
//!
//! Only the claim path and explicit user actions ever surface an error.
//! Heartbeat, release, and prune failures are logged and swallowed by the
//! lock service, so they never show up here.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for folio operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// User provided invalid arguments or the data root is unusable.
    #[error("{0}")]
    UserError(String),

    /// An exclusive resource is being edited by another session.
    #[error("Resource is locked: {0}")]
    LockHeld(String),

    /// Writing the lock record during an initial claim failed.
    #[error("Claim failed: {0}")]
    ClaimFailed(String),

    /// A lock record could not be written or deleted.
    #[error("Lock store I/O failed: {0}")]
    StoreError(String),
}

impl FolioError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FolioError::UserError(_) => exit_codes::USER_ERROR,
            FolioError::LockHeld(_) => exit_codes::LOCK_HELD,
            FolioError::ClaimFailed(_) => exit_codes::STORE_FAILURE,
            FolioError::StoreError(_) => exit_codes::STORE_FAILURE,
        }
    }
}

/// Result type alias for folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;
