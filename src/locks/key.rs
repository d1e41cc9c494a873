//! Resource keys and their on-disk filenames.

use crate::error::{FolioError, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Reserved key of the shared global preferences.
pub const SETTINGS_KEY: &str = "settings";

/// Namespace prefix of per-item keys.
pub const ITEM_PREFIX: &str = "photo:";

/// Extension of lock record files.
pub const LOCK_EXTENSION: &str = "lock";

/// Logical name of a protected resource.
///
/// The two families never overlap: the singleton is the bare word
/// `settings`, every item key starts with `photo:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    /// The shared global preferences.
    Settings,
    /// One archive item, identified by its path relative to the data root.
    Item(String),
}

impl ResourceKey {
    /// Build an item key from a relative path.
    ///
    /// Separators are normalized to `/` and leading `./` or `/` are dropped,
    /// so sessions on different platforms derive the same key.
    pub fn item(relative_path: &str) -> Result<Self> {
        let mut normalized = relative_path.trim().replace('\\', "/");
        loop {
            if let Some(rest) = normalized.strip_prefix("./") {
                normalized = rest.to_string();
            } else if let Some(rest) = normalized.strip_prefix('/') {
                normalized = rest.to_string();
            } else {
                break;
            }
        }

        if normalized.is_empty() {
            return Err(FolioError::UserError(format!(
                "invalid item identifier '{}': must name a file inside the data root",
                relative_path
            )));
        }

        Ok(ResourceKey::Item(normalized))
    }

    /// Parse a key from its string form (`settings` or `photo:<path>`).
    pub fn parse(s: &str) -> Result<Self> {
        if s == SETTINGS_KEY {
            return Ok(ResourceKey::Settings);
        }

        match s.strip_prefix(ITEM_PREFIX) {
            Some(path) => Self::item(path),
            None => Err(FolioError::UserError(format!(
                "invalid resource key '{}': expected '{}' or '{}<relative path>'",
                s, SETTINGS_KEY, ITEM_PREFIX
            ))),
        }
    }

    /// The string form used for equality checks and stored in records.
    pub fn as_key_string(&self) -> String {
        match self {
            ResourceKey::Settings => SETTINGS_KEY.to_string(),
            ResourceKey::Item(path) => format!("{}{}", ITEM_PREFIX, path),
        }
    }

    /// Whether this is the global singleton.
    pub fn is_global(&self) -> bool {
        matches!(self, ResourceKey::Settings)
    }

    /// Filename of this key's lock record.
    ///
    /// Item paths may contain separators, unicode, or exceed filename limits,
    /// so the name is the hex SHA-256 of the key string.
    pub fn file_name(&self) -> String {
        let digest = Sha256::digest(self.as_key_string().as_bytes());
        format!("{}.{}", hex::encode(digest), LOCK_EXTENSION)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key_string())
    }
}

impl std::str::FromStr for ResourceKey {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
