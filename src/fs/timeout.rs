//! Deadline wrapper for filesystem calls on a network share.
//!
//! A hung mount would otherwise block the calling thread indefinitely. The
//! operation runs on a short-lived worker thread and the caller waits at most
//! `timeout` for its result. A timed-out worker is abandoned, not killed; its
//! result is discarded when it eventually finishes.
//!
//! Abandoning a worker that mutates the store is not enough on its own: a
//! late rename could resurrect a record the caller has since deleted. Such
//! workers take a [`CommitGate`] and must win it before their visible step.
//! The caller and the worker race for the gate, so exactly one of "timed out"
//! and "committed" happens.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// One-shot arbiter between a worker's commit and its caller's timeout.
#[derive(Debug, Clone, Default)]
pub struct CommitGate {
    state: Arc<AtomicU8>,
}

impl CommitGate {
    /// A gate nobody has claimed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the worker right before its visible step.
    ///
    /// Returns `false` if the caller already gave up; the worker must then
    /// undo its private work and not touch the target.
    pub fn try_commit(&self) -> bool {
        self.transition(COMMITTING) || self.state.load(Ordering::Acquire) == COMMITTING
    }

    /// Whether the caller gave up on this operation.
    pub fn is_abandoned(&self) -> bool {
        self.state.load(Ordering::Acquire) == ABANDONED
    }

    /// Called by the caller when it stops waiting.
    ///
    /// Returns `false` if the worker already started committing.
    pub fn abandon(&self) -> bool {
        self.transition(ABANDONED)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Error returned by a worker that lost its [`CommitGate`].
pub fn abandoned_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::Interrupted,
        "filesystem operation abandoned after its deadline",
    )
}

/// Run `op` with an optional deadline.
///
/// With `None` the operation runs inline on the current thread. A missed
/// deadline is reported as [`io::ErrorKind::TimedOut`].
pub fn run_with_timeout<T, F>(timeout: Option<Duration>, op: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    run_gated_with_timeout(timeout, move |_| op())
}

/// Run a store-mutating `op` with an optional deadline.
///
/// `op` receives the operation's [`CommitGate`]. When the deadline passes
/// before `op` commits, the gate is closed and `TimedOut` is returned; `op`
/// can then never commit. When `op` committed first, the caller waits for
/// its result instead, since the change is already being made.
pub fn run_gated_with_timeout<T, F>(timeout: Option<Duration>, op: F) -> io::Result<T>
where
    F: FnOnce(&CommitGate) -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let gate = CommitGate::new();

    let Some(timeout) = timeout else {
        return op(&gate);
    };

    let (tx, rx) = mpsc::channel();
    let worker_gate = gate.clone();
    thread::Builder::new()
        .name("folio-io".to_string())
        .spawn(move || {
            let _ = tx.send(op(&worker_gate));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) if gate.abandon() => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("filesystem operation timed out after {:?}", timeout),
        )),
        Err(RecvTimeoutError::Timeout) => rx.recv().unwrap_or_else(|_| Err(worker_exited())),
        Err(RecvTimeoutError::Disconnected) => Err(worker_exited()),
    }
}

fn worker_exited() -> io::Error {
    io::Error::other("filesystem worker exited without a result")
}
