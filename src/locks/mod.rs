//! Soft-lock subsystem for folio.
//!
//! Sessions sharing one data root coordinate edits through lease records:
//! - Global settings lock (`settings`), exclusive
//! - Per-item locks (`photo:<relative path>`), advisory
//!
//! # Lock Files
//!
//! Records are stored in `<data root>/.folio/locks/`, one file per key, named
//! by the SHA-256 of the key. They are written atomically (temp file then
//! rename) and always overwritten, never appended. No exclusive-create is
//! used: the lock is cooperative, and the last writer wins.
//!
//! # Lock Records
//!
//! Each record contains JSON:
//! - `resource_key`: the logical key
//! - `session_id`, `user_display_name`, `device_name`, `session_started_at`:
//!   the holder
//! - `claimed_at`, `last_renewed_at`: RFC3339 timestamps
//! - `claim_token`: fencing nonce kept across renewals
//!
//! # Leases
//!
//! A holder renews its record on a heartbeat. A record not renewed within the
//! staleness threshold belongs to a crashed or disconnected session, and any
//! session may prune it.

mod api;
mod gate;
mod heartbeat;
mod key;
mod record;
mod service;
mod store;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use api::{active_other_sessions, prune_stale_locks, remove_lock, upsert_lock};
pub use gate::{GateMode, GateOutcome, HeldLock, ResourceGate};
pub use heartbeat::{Heartbeat, HeartbeatHandle};
pub use key::{ITEM_PREFIX, ResourceKey, SETTINGS_KEY};
pub use record::LockRecord;
pub use service::SoftLockService;
pub use store::LockStore;
pub use types::{ClaimTicket, LockInfo, LockState, RenewOutcome};
