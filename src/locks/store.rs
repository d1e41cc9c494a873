//! Filesystem adapter for lock records.
//!
//! One JSON file per resource key lives under `<data root>/.folio/locks/`.
//! Reads never fail: a missing, unreadable, or corrupt file is reported as
//! "no record" so corruption cannot deadlock a resource. Writes are atomic
//! and deletes are idempotent. Ownership is never checked here.

use super::key::{LOCK_EXTENSION, ResourceKey};
use super::record::LockRecord;
use crate::config::Config;
use crate::context::DataRoot;
use crate::error::{FolioError, Result};
use crate::fs::{
    abandoned_error, atomic_write_gated, is_temp_name, run_gated_with_timeout, run_with_timeout,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads, writes, and deletes lock records in one locks directory.
#[derive(Debug, Clone)]
pub struct LockStore {
    locks_dir: PathBuf,
    io_timeout: Option<Duration>,
}

impl LockStore {
    /// Create a store over `locks_dir`; every file operation is bounded by
    /// `io_timeout` when set.
    pub fn new(locks_dir: impl Into<PathBuf>, io_timeout: Option<Duration>) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            io_timeout,
        }
    }

    /// Create the store for a data root using its config.
    pub fn for_root(data_root: &DataRoot, config: &Config) -> Self {
        Self::new(&data_root.locks_dir, config.io_timeout())
    }

    /// The directory holding the record files.
    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }

    /// Path of the record file for `key`.
    pub fn path_for(&self, key: &ResourceKey) -> PathBuf {
        self.locks_dir.join(key.file_name())
    }

    /// Read the record for `key`, if a valid one exists.
    pub fn read(&self, key: &ResourceKey) -> Option<LockRecord> {
        let path = self.path_for(key);

        let target = path.clone();
        let content = match run_with_timeout(self.io_timeout, move || fs::read_to_string(target)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    path = %path.display(),
                    error = %e,
                    "unreadable lock record treated as unclaimed"
                );
                return None;
            }
        };

        let record = match LockRecord::from_json(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    path = %path.display(),
                    error = %e,
                    "corrupt lock record treated as unclaimed"
                );
                return None;
            }
        };

        if record.resource_key != key.as_key_string() {
            tracing::warn!(
                key = %key,
                stored_key = %record.resource_key,
                path = %path.display(),
                "lock record names a different resource; ignoring it"
            );
            return None;
        }

        Some(record)
    }

    /// Atomically write `record` as the record for `key`, replacing any
    /// existing one.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Record fully written
    /// * `Err(FolioError::StoreError)` - Write, rename, or timeout failure
    pub fn write(&self, key: &ResourceKey, record: &LockRecord) -> Result<()> {
        let path = self.path_for(key);
        let json = record.to_json()?;

        let target = path.clone();
        // A timed-out write must never land later, after a release.
        run_gated_with_timeout(self.io_timeout, move |gate| {
            atomic_write_gated(&target, json.as_bytes(), gate)
        })
        .map_err(|e| {
            FolioError::StoreError(format!(
                "failed to write lock record for '{}' at '{}': {}",
                key,
                path.display(),
                e
            ))
        })?;

        tracing::debug!(key = %key, path = %path.display(), "lock record written");
        Ok(())
    }

    /// Delete the record for `key`. Deleting an absent record succeeds.
    pub fn delete(&self, key: &ResourceKey) -> Result<()> {
        let path = self.path_for(key);

        let target = path.clone();
        let result = run_gated_with_timeout(self.io_timeout, move |gate| {
            if !gate.try_commit() {
                return Err(abandoned_error());
            }
            match fs::remove_file(&target) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        });

        match result {
            Ok(removed) => {
                tracing::debug!(key = %key, removed, "lock record deleted");
                Ok(())
            }
            Err(e) => Err(FolioError::StoreError(format!(
                "failed to delete lock record for '{}' at '{}': {}",
                key,
                path.display(),
                e
            ))),
        }
    }

    /// Every valid record in the store, sorted by key.
    ///
    /// Temporary files, foreign files, corrupt records, and records whose
    /// filename does not match their key are skipped.
    pub fn list(&self) -> Vec<(ResourceKey, LockRecord)> {
        let dir = self.locks_dir.clone();
        let files = match run_with_timeout(self.io_timeout, move || read_lock_files(&dir)) {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.locks_dir.display(),
                    error = %e,
                    "failed to list lock records"
                );
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (file_name, content) in files {
            let Ok(record) = LockRecord::from_json(&content) else {
                tracing::debug!(file = %file_name, "skipping unparsable lock file");
                continue;
            };
            let Ok(key) = ResourceKey::parse(&record.resource_key) else {
                tracing::debug!(file = %file_name, "skipping lock file with invalid key");
                continue;
            };
            if key.file_name() != file_name {
                tracing::debug!(file = %file_name, key = %key, "skipping misplaced lock file");
                continue;
            }
            records.push((key, record));
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }
}

/// Read `(file name, content)` of every candidate lock file in `dir`.
fn read_lock_files(dir: &Path) -> io::Result<Vec<(String, String)>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_temp_name(name) || path.extension().and_then(|e| e.to_str()) != Some(LOCK_EXTENSION)
        {
            continue;
        }

        // A record deleted between read_dir and read is simply gone.
        match fs::read_to_string(&path) {
            Ok(content) => files.push((name.to_string(), content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(files)
}
