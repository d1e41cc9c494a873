//! The soft-lock protocol engine.
//!
//! Every operation works on one resource key through the [`LockStore`]. There
//! is no compare-and-swap anywhere: two sessions upserting the same key inside
//! one propagation window both succeed. The claim token stored in each record
//! lets a holder notice afterwards that it lost such a race.

use super::key::ResourceKey;
use super::record::LockRecord;
use super::store::LockStore;
use super::types::{ClaimTicket, LockInfo, LockState, RenewOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::context::DataRoot;
use crate::error::Result;
use crate::session::SessionIdentity;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Slot table size above which idle slots are dropped.
const SINGLE_FLIGHT_SWEEP_AT: usize = 64;

/// Serializes same-key operations issued from within this process.
///
/// Overlapping writes from one holder are harmless, but a manual re-check
/// racing a heartbeat tick would interleave reads and writes for nothing.
#[derive(Debug, Default)]
struct SingleFlight {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    fn slot(&self, key: &ResourceKey) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poison| poison.into_inner());
        if slots.len() >= SINGLE_FLIGHT_SWEEP_AT {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(key.as_key_string()).or_default().clone()
    }
}

/// Claims, renews, queries, and releases soft locks under one data root.
#[derive(Debug)]
pub struct SoftLockService<C: Clock = SystemClock> {
    store: LockStore,
    stale_threshold: Duration,
    heartbeat_interval: std::time::Duration,
    clock: C,
    inflight: SingleFlight,
}

impl SoftLockService<SystemClock> {
    /// Open the service for a data root, loading its shared config.
    ///
    /// # Returns
    ///
    /// * `Err(FolioError::UserError)` - The config file exists but is invalid
    pub fn open(data_root: &DataRoot) -> Result<Self> {
        let config = data_root.load_config()?;
        Ok(Self::for_root(data_root, &config))
    }

    /// Build the service for a data root with an explicit config.
    pub fn for_root(data_root: &DataRoot, config: &Config) -> Self {
        Self::with_clock(LockStore::for_root(data_root, config), config, SystemClock)
    }
}

impl<C: Clock> SoftLockService<C> {
    /// Build the service over `store`, reading time from `clock`.
    pub fn with_clock(store: LockStore, config: &Config, clock: C) -> Self {
        Self {
            store,
            stale_threshold: config.stale_threshold(),
            heartbeat_interval: config.heartbeat_interval(),
            clock,
            inflight: SingleFlight::default(),
        }
    }

    /// The underlying record store.
    pub fn store(&self) -> &LockStore {
        &self.store
    }

    /// The clock used for timestamps and staleness.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Age after which an unrenewed record is stale.
    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Interval at which holders should renew.
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        self.heartbeat_interval
    }

    /// Delete the record for `key` if it is stale.
    ///
    /// Safe to race with other sessions pruning the same key. A failed delete
    /// is logged and the record is left for the next prune.
    ///
    /// Returns whether a stale record was removed.
    pub fn prune_stale_locks(&self, key: &ResourceKey) -> bool {
        let slot = self.inflight.slot(key);
        let _guard = slot.lock().unwrap_or_else(|poison| poison.into_inner());
        self.prune_unguarded(key)
    }

    /// Sessions other than `current_session_id` holding a live claim on `key`.
    ///
    /// Prunes first, so a stale holder is never reported. The result has at
    /// most one entry.
    pub fn active_other_sessions(
        &self,
        key: &ResourceKey,
        current_session_id: &str,
    ) -> Vec<SessionIdentity> {
        let slot = self.inflight.slot(key);
        let _guard = slot.lock().unwrap_or_else(|poison| poison.into_inner());

        self.prune_unguarded(key);

        match self.store.read(key) {
            Some(record) if !record.is_held_by(current_session_id) => {
                tracing::debug!(key = %key, holder = %record.holder, "resource held by another session");
                vec![record.holder]
            }
            _ => Vec::new(),
        }
    }

    /// Write `session` as the holder of `key` with `last_renewed_at = now`.
    ///
    /// Used both for the initial claim and for heartbeat renewals.
    ///
    /// # Returns
    ///
    /// * `Ok(LockRecord)` - The record as written
    /// * `Err(FolioError::StoreError)` - The write failed
    pub fn upsert_lock(&self, key: &ResourceKey, session: &SessionIdentity) -> Result<LockRecord> {
        let slot = self.inflight.slot(key);
        let _guard = slot.lock().unwrap_or_else(|poison| poison.into_inner());

        let existing = self.store.read(key);
        self.upsert_unguarded(key, existing.as_ref(), session)
    }

    /// Delete the record for `key`.
    ///
    /// The stored holder is not checked against `session_id`; callers release
    /// only what they believe they hold. Failures are logged and swallowed:
    /// at worst the record goes stale and is pruned later.
    pub fn remove_lock(&self, key: &ResourceKey, session_id: &str) {
        let slot = self.inflight.slot(key);
        let _guard = slot.lock().unwrap_or_else(|poison| poison.into_inner());

        // The extra read only feeds a debug message; skip the I/O otherwise.
        if tracing::enabled!(tracing::Level::DEBUG)
            && let Some(record) = self.store.read(key)
            && !record.is_held_by(session_id)
        {
            tracing::debug!(
                key = %key,
                holder = %record.holder,
                "removing a lock recorded for a different session"
            );
        }

        match self.store.delete(key) {
            Ok(()) => tracing::info!(key = %key, "lock released"),
            Err(e) => tracing::warn!(key = %key, error = %e, "failed to release lock; it will go stale"),
        }
    }

    /// Classify `key` from the viewpoint of `session_id` without pruning.
    pub fn lock_state(&self, key: &ResourceKey, session_id: &str) -> LockState {
        match self.store.read(key) {
            None => LockState::Unclaimed,
            Some(record) if record.is_stale(self.clock.now(), self.stale_threshold) => {
                LockState::Stale(record)
            }
            Some(record) if record.is_held_by(session_id) => LockState::HeldByMe(record),
            Some(record) => LockState::HeldByOther(record),
        }
    }

    /// Every stored lock with its staleness at the current time.
    pub fn list_locks(&self) -> Vec<LockInfo> {
        let now = self.clock.now();
        self.store
            .list()
            .into_iter()
            .map(|(key, record)| LockInfo {
                path: self.store.path_for(&key),
                is_stale: record.is_stale(now, self.stale_threshold),
                age: record.age_string(now),
                key,
                record,
            })
            .collect()
    }

    /// Prune every stale record in the store.
    ///
    /// Returns the records that were removed.
    pub fn prune_all_stale(&self) -> Vec<LockRecord> {
        let now = self.clock.now();
        let mut pruned = Vec::new();

        for (key, record) in self.store.list() {
            if record.is_stale(now, self.stale_threshold) && self.prune_stale_locks(&key) {
                pruned.push(record);
            }
        }

        pruned
    }

    /// Heartbeat renewal of the claim described by `ticket`.
    ///
    /// The record is always rewritten, even when another session has taken
    /// the resource meanwhile; the outcome reports what was overwritten. On
    /// any write, `ticket` is updated to the token now on disk. Never fails:
    /// a write error is logged and returned as [`RenewOutcome::Failed`].
    pub fn renew(&self, ticket: &mut ClaimTicket) -> RenewOutcome {
        let key = ticket.key.clone();
        let slot = self.inflight.slot(&key);
        let _guard = slot.lock().unwrap_or_else(|poison| poison.into_inner());

        let existing = self.store.read(&key);
        let outcome = match &existing {
            None => RenewOutcome::Recovered,
            Some(record)
                if record.is_held_by(&ticket.holder.session_id)
                    && (record.claim_token.is_empty() || record.claim_token == ticket.claim_token) =>
            {
                RenewOutcome::Renewed
            }
            Some(record) => RenewOutcome::Contested {
                other: record.holder.clone(),
            },
        };

        match self.upsert_unguarded(&key, existing.as_ref(), &ticket.holder) {
            Ok(record) => {
                match &outcome {
                    RenewOutcome::Recovered => {
                        tracing::warn!(key = %key, "lock record vanished while held; claimed again")
                    }
                    RenewOutcome::Contested { other } => tracing::warn!(
                        key = %key,
                        other = %other,
                        "lock was taken over by another session; both sessions may now be editing"
                    ),
                    _ => {}
                }
                ticket.claim_token = record.claim_token;
                ticket.claimed_at = record.claimed_at;
                outcome
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "heartbeat renewal failed");
                RenewOutcome::Failed(e.to_string())
            }
        }
    }

    fn prune_unguarded(&self, key: &ResourceKey) -> bool {
        let Some(record) = self.store.read(key) else {
            return false;
        };

        let now = self.clock.now();
        if !record.is_stale(now, self.stale_threshold) {
            return false;
        }

        match self.store.delete(key) {
            Ok(()) => {
                tracing::info!(
                    key = %key,
                    holder = %record.holder,
                    age = %record.age_string(now),
                    "pruned stale lock"
                );
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to prune stale lock");
                false
            }
        }
    }

    fn upsert_unguarded(
        &self,
        key: &ResourceKey,
        existing: Option<&LockRecord>,
        session: &SessionIdentity,
    ) -> Result<LockRecord> {
        let record = LockRecord::upsert(existing, key, session, self.clock.now());
        self.store.write(key, &record)?;
        tracing::debug!(key = %key, holder = %session, "lock upserted");
        Ok(record)
    }
}
