//! Lock state and information structures.

use super::key::ResourceKey;
use super::record::LockRecord;
use crate::session::SessionIdentity;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// State of one resource as seen by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No record exists.
    Unclaimed,
    /// The asking session holds a live claim.
    HeldByMe(LockRecord),
    /// Another session holds a live claim.
    HeldByOther(LockRecord),
    /// A record exists but has not been renewed within the threshold.
    /// Once pruned this is the same as `Unclaimed`.
    Stale(LockRecord),
}

impl LockState {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            LockState::Unclaimed => "unclaimed",
            LockState::HeldByMe(_) => "held by this session",
            LockState::HeldByOther(_) => "held by another session",
            LockState::Stale(_) => "stale",
        }
    }

    /// The record behind the state, if any.
    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            LockState::Unclaimed => None,
            LockState::HeldByMe(r) | LockState::HeldByOther(r) | LockState::Stale(r) => Some(r),
        }
    }
}

/// Proof of a successful claim, carried by the holder until release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTicket {
    /// The claimed resource.
    pub key: ResourceKey,
    /// The session that claimed it.
    pub holder: SessionIdentity,
    /// Fencing nonce of the claim as last written by this holder.
    pub claim_token: String,
    /// When the claim was made.
    pub claimed_at: DateTime<Utc>,
}

impl ClaimTicket {
    /// Ticket for a record this session just wrote.
    pub fn from_record(key: ResourceKey, record: &LockRecord) -> Self {
        Self {
            key,
            holder: record.holder.clone(),
            claim_token: record.claim_token.clone(),
            claimed_at: record.claimed_at,
        }
    }
}

/// Result of one heartbeat renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    /// Our record was still in place and has been renewed.
    Renewed,
    /// Our record had disappeared (pruned or cleared) and was written again.
    Recovered,
    /// Another session had claimed the resource; we overwrote its record.
    /// Both sessions may now believe they hold the lock.
    Contested {
        /// The session whose record we replaced.
        other: SessionIdentity,
    },
    /// The renewal write failed; the next tick will try again.
    Failed(String),
}

/// Information about a stored lock, for listing.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The protected resource.
    pub key: ResourceKey,

    /// The stored record.
    pub record: LockRecord,

    /// Whether the record is stale at listing time.
    pub is_stale: bool,

    /// Human-readable time since last renewal.
    pub age: String,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (holder: {}, renewed {} ago{})",
            self.key,
            self.record.holder,
            self.age,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
