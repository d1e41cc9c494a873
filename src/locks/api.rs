//! Root-addressed entry points for callers that do not keep a service.
//!
//! The first call for a data root opens it, loads its shared config (falling
//! back to defaults if the file is missing or invalid), and caches the
//! resulting service for the rest of the process. Later calls for the same
//! root share that service, and with it the per-key single-flight, so a
//! heartbeat and a manual re-check issued through these functions still
//! serialize. Config edits made after the first call are not picked up;
//! callers that need that should build their own [`SoftLockService`].

use super::key::ResourceKey;
use super::record::LockRecord;
use super::service::SoftLockService;
use crate::config::Config;
use crate::context::DataRoot;
use crate::error::Result;
use crate::session::SessionIdentity;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

static SERVICES: OnceLock<Mutex<HashMap<PathBuf, Arc<SoftLockService>>>> = OnceLock::new();

fn open_service(root: &Path) -> Result<Arc<SoftLockService>> {
    let data_root = DataRoot::open(root)?;
    let services = SERVICES.get_or_init(Default::default);

    if let Some(service) = services
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .get(&data_root.root)
    {
        return Ok(service.clone());
    }

    let config = data_root.load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid shared config; using defaults");
        Config::default()
    });
    let service = Arc::new(SoftLockService::for_root(&data_root, &config));

    // Another thread may have opened the same root meanwhile; keep the first.
    let mut services = services.lock().unwrap_or_else(|poison| poison.into_inner());
    Ok(services
        .entry(data_root.root.clone())
        .or_insert(service)
        .clone())
}

/// Delete the record for `key` under `root` if it is stale.
pub fn prune_stale_locks(root: &Path, key: &ResourceKey) {
    match open_service(root) {
        Ok(service) => {
            service.prune_stale_locks(key);
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "skipping prune"),
    }
}

/// Sessions other than `current_session_id` holding `key` under `root`.
///
/// An unusable root reports no holders; the subsequent claim will surface
/// the problem.
pub fn active_other_sessions(
    root: &Path,
    key: &ResourceKey,
    current_session_id: &str,
) -> Vec<SessionIdentity> {
    match open_service(root) {
        Ok(service) => service.active_other_sessions(key, current_session_id),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cannot query lock holders");
            Vec::new()
        }
    }
}

/// Claim or renew `key` under `root` for `session`.
///
/// # Returns
///
/// * `Err(FolioError::UserError)` - `root` is not a directory
/// * `Err(FolioError::StoreError)` - The record could not be written
pub fn upsert_lock(root: &Path, key: &ResourceKey, session: &SessionIdentity) -> Result<LockRecord> {
    open_service(root)?.upsert_lock(key, session)
}

/// Release `key` under `root`. Failures are logged, never returned.
pub fn remove_lock(root: &Path, key: &ResourceKey, session_id: &str) {
    match open_service(root) {
        Ok(service) => service.remove_lock(key, session_id),
        Err(e) => tracing::warn!(key = %key, error = %e, "skipping release"),
    }
}
