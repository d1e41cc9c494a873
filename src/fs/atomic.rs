//! Atomic file writes for lock records.
//!
//! Readers on a network share must never observe a half-written record, so
//! every write follows the same pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename the temporary file over the target
//!
//! # Notes
//!
//! - Source and destination must be on the same filesystem for atomic rename
//! - The temporary name carries a random suffix (`.{filename}.{uuid}.tmp`) so
//!   two machines writing the same record never share a temp file
//! - On crash, a temporary file may remain; readers ignore `.tmp` files

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::timeout::{CommitGate, abandoned_error};

/// Suffix shared by every in-flight temporary file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Atomically write bytes to a file.
///
/// The parent directory is created if needed. On any failure the temporary
/// file is removed and the target is left untouched.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<()> {
    atomic_write_gated(path, content, &CommitGate::new())
}

/// [`atomic_write`] that renames only if it wins `gate`.
///
/// When the caller has already abandoned the write, the temporary file is
/// removed, the target is left untouched, and `Interrupted` is returned.
pub fn atomic_write_gated<P: AsRef<Path>>(
    path: P,
    content: &[u8],
    gate: &CommitGate,
) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }

    let temp_path = generate_temp_path(path)?;

    write_and_sync(&temp_path, content)?;

    if !gate.try_commit() {
        let _ = fs::remove_file(&temp_path);
        return Err(abandoned_error());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    sync_parent_dir(path);

    Ok(())
}

/// Persist the directory entry of `path`; not every filesystem supports it.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Returns true if `name` looks like a temporary file left by [`atomic_write`].
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Generate a unique temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> io::Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid file path"))?;

    let temp_name = format!(".{}.{}{}", filename, Uuid::new_v4().simple(), TEMP_SUFFIX);
    Ok(parent.join(temp_name))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;

    let result = file.write_all(content).and_then(|_| file.sync_all());
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}
