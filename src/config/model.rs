//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for soft-lock coordination.
///
/// This struct represents the contents of `<data root>/.folio/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Seconds without renewal after which a lock is considered stale.
    ///
    /// Must exceed the heartbeat interval plus worst-case clock skew and
    /// share propagation delay.
    #[serde(default = "default_lock_stale_seconds")]
    pub lock_stale_seconds: u64,

    /// Seconds between heartbeat renewals of a held lock.
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,

    // =========================================================================
    // Filesystem settings
    // =========================================================================
    /// Deadline in seconds for one lock file read/write/delete (0 disables).
    #[serde(default = "default_io_timeout_seconds")]
    pub io_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_stale_seconds: default_lock_stale_seconds(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            io_timeout_seconds: default_io_timeout_seconds(),
        }
    }
}
