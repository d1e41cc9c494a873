//! Exit code constants for the folio CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid data root or config)
//! - 4: Resource is held by another session
//! - 5: Lock store I/O failure (including a failed claim write)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing data root, or invalid config.
pub const USER_ERROR: i32 = 1;

/// An exclusive claim was blocked by another session's lock.
pub const LOCK_HELD: i32 = 4;

/// A lock record could not be written or deleted.
pub const STORE_FAILURE: i32 = 5;
