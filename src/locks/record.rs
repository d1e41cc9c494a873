//! Lock record structure and staleness rules.

use super::key::ResourceKey;
use crate::error::{FolioError, Result};
use crate::session::SessionIdentity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted claim on one resource.
///
/// Serialized as a flat JSON object; the holder's identity fields sit next to
/// the claim timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// String form of the protected resource key.
    pub resource_key: String,

    /// Identity of the session holding the claim.
    #[serde(flatten)]
    pub holder: SessionIdentity,

    /// When the current holder first claimed the resource.
    pub claimed_at: DateTime<Utc>,

    /// When the current holder last renewed the claim.
    pub last_renewed_at: DateTime<Utc>,

    /// Fencing nonce minted at claim time and kept across renewals.
    ///
    /// Records written by older clients have no token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claim_token: String,
}

impl LockRecord {
    /// A fresh claim of `key` by `holder` at `now`.
    pub fn claim(key: &ResourceKey, holder: &SessionIdentity, now: DateTime<Utc>) -> Self {
        Self {
            resource_key: key.as_key_string(),
            holder: holder.clone(),
            claimed_at: now,
            last_renewed_at: now,
            claim_token: Uuid::new_v4().simple().to_string(),
        }
    }

    /// The record `holder` should write on top of `existing`.
    ///
    /// A renewal by the same session keeps `claimed_at` and the claim token;
    /// anything else is a new claim.
    pub fn upsert(
        existing: Option<&LockRecord>,
        key: &ResourceKey,
        holder: &SessionIdentity,
        now: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(record) if record.is_held_by(&holder.session_id) && !record.claim_token.is_empty() => {
                Self {
                    resource_key: key.as_key_string(),
                    holder: holder.clone(),
                    claimed_at: record.claimed_at,
                    last_renewed_at: now,
                    claim_token: record.claim_token.clone(),
                }
            }
            _ => Self::claim(key, holder, now),
        }
    }

    /// Whether `session_id` holds this record.
    pub fn is_held_by(&self, session_id: &str) -> bool {
        self.holder.session_id == session_id
    }

    /// Time since the last renewal.
    ///
    /// Negative when the writer's clock runs ahead of ours.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_renewed_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self, now: DateTime<Utc>) -> String {
        let age = self.age(now);
        let seconds = age.num_seconds().max(0);
        let minutes = age.num_minutes().max(0);
        let hours = age.num_hours().max(0);
        let days = age.num_days().max(0);

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Whether the record has gone unrenewed for longer than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) > threshold
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FolioError::StoreError(format!("failed to serialize lock record: {}", e)))
    }

    /// Parse a record from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
