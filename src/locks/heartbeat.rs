//! Heartbeat renewal of a held lock.
//!
//! [`Heartbeat`] is the schedule itself: it knows when the next renewal is due
//! and performs it when polled. It never sleeps, so tests drive it with a
//! manual clock. [`HeartbeatHandle`] runs a heartbeat on a background thread
//! with a real timer. Cancelling the handle joins the thread, so once
//! `cancel` returns no further renewal can resurrect a released lock.

use super::service::SoftLockService;
use super::types::{ClaimTicket, RenewOutcome};
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Renewal schedule for one claim.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    ticket: ClaimTicket,
    interval: Duration,
    next_due: DateTime<Utc>,
    cancelled: bool,
}

impl Heartbeat {
    /// Schedule renewals of `ticket` every `interval`, first one due one
    /// interval after `started_at`.
    pub fn new(ticket: ClaimTicket, interval: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            ticket,
            interval,
            next_due: due_after(started_at, interval),
            cancelled: false,
        }
    }

    /// The claim being renewed, with the latest token written.
    pub fn ticket(&self) -> &ClaimTicket {
        &self.ticket
    }

    /// When the next renewal is due.
    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    /// Renew if the next tick is due at the service clock's current time.
    ///
    /// Returns `None` when nothing was due or the heartbeat is cancelled.
    pub fn poll<C: Clock>(&mut self, service: &SoftLockService<C>) -> Option<RenewOutcome> {
        if self.cancelled || service.clock().now() < self.next_due {
            return None;
        }
        self.renew_now(service)
    }

    /// Renew immediately and schedule the next tick from now.
    pub fn renew_now<C: Clock>(&mut self, service: &SoftLockService<C>) -> Option<RenewOutcome> {
        if self.cancelled {
            return None;
        }
        let outcome = service.renew(&mut self.ticket);
        self.next_due = due_after(service.clock().now(), self.interval);
        Some(outcome)
    }

    /// Stop all future renewals.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

fn due_after(at: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|interval| at.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A heartbeat running on its own thread.
#[derive(Debug)]
pub struct HeartbeatHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<Heartbeat>>,
}

impl HeartbeatHandle {
    /// Start renewing on a background thread, once per heartbeat interval.
    ///
    /// `observer` sees every renewal outcome, on the heartbeat thread.
    pub fn spawn<C, F>(
        service: Arc<SoftLockService<C>>,
        mut heartbeat: Heartbeat,
        mut observer: F,
    ) -> std::io::Result<Self>
    where
        C: Clock + 'static,
        F: FnMut(&RenewOutcome) + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let interval = heartbeat.interval;

        let thread = thread::Builder::new()
            .name("folio-heartbeat".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some(outcome) = heartbeat.renew_now(&service) {
                                observer(&outcome);
                            }
                        }
                        // Explicit stop or the handle was dropped.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                heartbeat.cancel();
                heartbeat
            })?;

        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it to exit.
    ///
    /// Returns the final heartbeat state (with the latest ticket), or `None`
    /// if the thread panicked.
    pub fn cancel(mut self) -> Option<Heartbeat> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Heartbeat> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(heartbeat) => Some(heartbeat),
            Err(_) => {
                tracing::warn!("heartbeat thread panicked");
                None
            }
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
