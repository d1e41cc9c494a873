//! Data root resolution for folio.
//!
//! The data root is the shared folder every session treats as the single
//! source of truth. folio reserves one subdirectory inside it (`.folio/`) for
//! its own state: the lock records and the shared config file.
//!
//! The root is always passed explicitly into the lock service; nothing in the
//! library reads it from ambient globals.

use crate::config::Config;
use crate::error::{FolioError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no `--root` flag is given.
pub const DATA_ROOT_ENV: &str = "FOLIO_DATA_ROOT";

/// Reserved state directory name within the data root.
pub const STATE_DIR_NAME: &str = ".folio";

/// Lock record directory name within the state directory.
pub const LOCKS_DIR_NAME: &str = "locks";

/// Config file name within the state directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolved paths for one shared data root.
///
/// All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    /// Absolute path to the shared data root chosen by the user.
    pub root: PathBuf,

    /// Absolute path to the reserved state directory (`{root}/.folio/`).
    pub state_dir: PathBuf,

    /// Absolute path to the lock record directory (`{root}/.folio/locks/`).
    pub locks_dir: PathBuf,
}

impl DataRoot {
    /// Open a data root at `path`.
    ///
    /// The directory must already exist; the reserved subdirectories are
    /// created lazily by the first write.
    ///
    /// # Returns
    ///
    /// * `Ok(DataRoot)` - Successfully resolved root
    /// * `Err(FolioError::UserError)` - Path missing or not a directory (exit code 1)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(FolioError::UserError(format!(
                "data root '{}' does not exist or is not a directory",
                path.display()
            )));
        }

        let root = path.canonicalize().map_err(|e| {
            FolioError::UserError(format!(
                "failed to resolve data root '{}': {}",
                path.display(),
                e
            ))
        })?;

        let state_dir = root.join(STATE_DIR_NAME);
        let locks_dir = state_dir.join(LOCKS_DIR_NAME);

        Ok(Self {
            root,
            state_dir,
            locks_dir,
        })
    }

    /// Resolve the data root from an explicit path or the environment.
    ///
    /// Precedence: `explicit` first, then `FOLIO_DATA_ROOT`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None => env::var_os(DATA_ROOT_ENV).map(PathBuf::from).ok_or_else(|| {
                FolioError::UserError(format!(
                    "no data root given.\n\
                     Pass --root <PATH> or set {} to the shared archive folder.",
                    DATA_ROOT_ENV
                ))
            })?,
        };

        Self::open(path)
    }

    /// Path to the shared config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the shared config, falling back to defaults if it is absent.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }
}
