//! Consumer patterns on top of the lock service.
//!
//! Two kinds of callers use the protocol:
//! - the global settings screen, which blocks while anyone else holds it
//!   ([`GateMode::Exclusive`]);
//! - per-item editors, which only warn about another editor and let local
//!   edits continue ([`GateMode::Advisory`]).
//!
//! Both evaluate once on entry. There is no automatic retry while blocked;
//! the caller re-evaluates when the user asks to check again.

use super::heartbeat::{Heartbeat, HeartbeatHandle};
use super::key::ResourceKey;
use super::service::SoftLockService;
use super::types::{ClaimTicket, RenewOutcome};
use crate::clock::{Clock, SystemClock};
use crate::error::{FolioError, Result};
use crate::session::SessionIdentity;
use std::sync::Arc;

/// How a conflict affects the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Another holder blocks entry.
    Exclusive,
    /// Another holder produces a warning only; nothing is claimed.
    Advisory,
}

impl GateMode {
    /// The customary mode for a key: exclusive for the global singleton,
    /// advisory for items.
    pub fn for_key(key: &ResourceKey) -> Self {
        if key.is_global() {
            GateMode::Exclusive
        } else {
            GateMode::Advisory
        }
    }
}

/// Result of evaluating a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// No one else holds the resource; this session has claimed it.
    Entered(ClaimTicket),
    /// Exclusive gate: another session holds the resource.
    Blocked {
        /// The session to name in the "who is editing" message.
        holder: SessionIdentity,
    },
    /// Advisory gate: another session holds the resource; edit anyway.
    Shared {
        /// Sessions to name in the warning banner.
        others: Vec<SessionIdentity>,
    },
}

/// Access check for one resource on behalf of one session.
#[derive(Debug)]
pub struct ResourceGate<C: Clock + 'static = SystemClock> {
    service: Arc<SoftLockService<C>>,
    key: ResourceKey,
    session: SessionIdentity,
    mode: GateMode,
}

impl<C: Clock + 'static> ResourceGate<C> {
    /// A gate for `key` in `mode`.
    pub fn new(
        service: Arc<SoftLockService<C>>,
        key: ResourceKey,
        session: SessionIdentity,
        mode: GateMode,
    ) -> Self {
        Self {
            service,
            key,
            session,
            mode,
        }
    }

    /// The protected resource.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// The gate's conflict mode.
    pub fn mode(&self) -> GateMode {
        self.mode
    }

    /// The service behind the gate.
    pub fn service(&self) -> &Arc<SoftLockService<C>> {
        &self.service
    }

    /// Prune, look for other holders, and claim if there are none.
    ///
    /// Calling this again is the manual "check again" action.
    ///
    /// # Returns
    ///
    /// * `Err(FolioError::ClaimFailed)` - No one else held the resource but
    ///   writing our claim failed; the caller must stay blocked
    pub fn evaluate(&self) -> Result<GateOutcome> {
        let others = self
            .service
            .active_other_sessions(&self.key, &self.session.session_id);

        if let Some(holder) = others.first() {
            return Ok(match self.mode {
                GateMode::Exclusive => {
                    tracing::info!(key = %self.key, holder = %holder, "entry blocked by another session");
                    GateOutcome::Blocked {
                        holder: holder.clone(),
                    }
                }
                GateMode::Advisory => {
                    tracing::info!(key = %self.key, holder = %holder, "another session is editing; continuing");
                    GateOutcome::Shared { others }
                }
            });
        }

        let record = self
            .service
            .upsert_lock(&self.key, &self.session)
            .map_err(|e| FolioError::ClaimFailed(format!("could not claim '{}': {}", self.key, e)))?;

        tracing::info!(key = %self.key, "lock claimed");
        Ok(GateOutcome::Entered(ClaimTicket::from_record(
            self.key.clone(),
            &record,
        )))
    }
}

/// A claimed lock, released when dropped.
///
/// Dropping covers every exit path of the consumer, abnormal ones included.
/// Release cancels the heartbeat first so no late tick can write the record
/// back after it has been deleted.
#[derive(Debug)]
pub struct HeldLock<C: Clock + 'static = SystemClock> {
    service: Arc<SoftLockService<C>>,
    ticket: ClaimTicket,
    heartbeat: Option<HeartbeatHandle>,
    released: bool,
}

impl<C: Clock + 'static> HeldLock<C> {
    /// Take ownership of a claim without renewing it.
    pub fn new(service: Arc<SoftLockService<C>>, ticket: ClaimTicket) -> Self {
        Self {
            service,
            ticket,
            heartbeat: None,
            released: false,
        }
    }

    /// Take ownership of a claim and renew it on a background thread.
    ///
    /// `observer` sees every renewal outcome.
    pub fn with_heartbeat<F>(
        service: Arc<SoftLockService<C>>,
        ticket: ClaimTicket,
        observer: F,
    ) -> Result<Self>
    where
        F: FnMut(&RenewOutcome) + Send + 'static,
    {
        let mut held = Self::new(service, ticket);
        held.start_heartbeat(observer)?;
        Ok(held)
    }

    /// Start the background heartbeat if it is not already running.
    pub fn start_heartbeat<F>(&mut self, observer: F) -> Result<()>
    where
        F: FnMut(&RenewOutcome) + Send + 'static,
    {
        if self.heartbeat.is_some() {
            return Ok(());
        }

        let heartbeat = Heartbeat::new(
            self.ticket.clone(),
            self.service.heartbeat_interval(),
            self.service.clock().now(),
        );
        let handle = HeartbeatHandle::spawn(self.service.clone(), heartbeat, observer).map_err(
            |e| FolioError::UserError(format!("failed to start heartbeat for '{}': {}", self.ticket.key, e)),
        )?;
        self.heartbeat = Some(handle);
        Ok(())
    }

    /// The claim as of the last renewal this holder observed.
    pub fn ticket(&self) -> &ClaimTicket {
        &self.ticket
    }

    /// Whether a background heartbeat is running.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Stop renewing and release the lock now.
    ///
    /// Release failures are logged, never returned.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(handle) = self.heartbeat.take()
            && let Some(heartbeat) = handle.cancel()
        {
            self.ticket = heartbeat.ticket().clone();
        }

        self.service
            .remove_lock(&self.ticket.key, &self.ticket.holder.session_id);
    }
}

impl<C: Clock + 'static> Drop for HeldLock<C> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
