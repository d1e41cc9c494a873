use crate::clock::ManualClock;
use crate::config::Config;
use crate::context::DataRoot;
use crate::locks::{LockStore, SoftLockService};
use crate::session::SessionIdentity;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// A fresh data root in a temp directory.
pub(crate) fn create_test_root() -> (TempDir, DataRoot) {
    let temp_dir = TempDir::new().unwrap();
    let data_root = DataRoot::open(temp_dir.path()).unwrap();
    (temp_dir, data_root)
}

/// A manual clock starting at a fixed, readable instant.
pub(crate) fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap())
}

/// Service over `data_root` using the default timings and `clock`.
///
/// Every simulated session gets its own service instance, like separate
/// processes sharing one folder.
pub(crate) fn session_service(
    data_root: &DataRoot,
    clock: &ManualClock,
) -> Arc<SoftLockService<ManualClock>> {
    let config = Config::default();
    Arc::new(SoftLockService::with_clock(
        LockStore::for_root(data_root, &config),
        &config,
        clock.clone(),
    ))
}

/// A session for a named test user on a named device.
pub(crate) fn test_session(user: &str, device: &str) -> SessionIdentity {
    SessionIdentity::new(user, device)
}
