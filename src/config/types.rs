//! Configuration constants and default value functions.

/// Minimum ratio between `lock_stale_seconds` and `heartbeat_interval_seconds`.
///
/// An active holder must get at least this many renewal chances inside one
/// staleness window, or clock skew and share latency can evict it.
pub const MIN_STALE_TO_HEARTBEAT_RATIO: u64 = 3;

/// Default staleness threshold: 2 minutes.
pub fn default_lock_stale_seconds() -> u64 {
    120
}

/// Default heartbeat interval: 30 seconds.
pub fn default_heartbeat_interval_seconds() -> u64 {
    30
}

/// Default deadline for a single lock file operation.
pub fn default_io_timeout_seconds() -> u64 {
    10
}
