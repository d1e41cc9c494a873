//! Session identity for one running folio process.
//!
//! A session is created once per process launch and never changes. Its id is
//! drawn from the OS random source (UUID v4), so two processes on any number
//! of machines collide only with negligible probability. The display and
//! device names are informational: they tell other users who is editing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Placeholder used when the OS cannot supply a user name.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Placeholder used when the OS cannot supply a host name.
pub const UNKNOWN_DEVICE: &str = "Unknown Device";

static DEFAULT_SESSION: OnceLock<SessionIdentity> = OnceLock::new();

/// Identity of one running process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Opaque, high-entropy id unique to this process start.
    pub session_id: String,

    /// Human-readable name of the user running the process.
    pub user_display_name: String,

    /// Human-readable name of the machine running the process.
    pub device_name: String,

    /// When the session was created.
    #[serde(rename = "session_started_at")]
    pub created_at: DateTime<Utc>,
}

impl SessionIdentity {
    /// Create a session with a fresh id and the given names.
    pub fn new(user_display_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().simple().to_string(),
            user_display_name: user_display_name.into(),
            device_name: device_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a session named after the current user and host.
    pub fn generate() -> Self {
        Self::new(host_user_name(), host_device_name())
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.user_display_name, self.device_name)
    }
}

/// The identity of this process, created on first use.
pub fn default_session_info() -> &'static SessionIdentity {
    DEFAULT_SESSION.get_or_init(SessionIdentity::generate)
}

/// The session id of this process.
pub fn current_session_id() -> &'static str {
    &default_session_info().session_id
}

fn host_user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

fn host_device_name() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
}
