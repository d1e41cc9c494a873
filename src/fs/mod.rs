//! Filesystem utilities for folio.
//!
//! Atomic writes keep lock records whole for readers on other machines, and
//! the timeout wrapper bounds how long a hung share can block a caller.

pub mod atomic;
mod timeout;

pub use atomic::{atomic_write, atomic_write_gated, is_temp_name};
pub use timeout::{CommitGate, abandoned_error, run_gated_with_timeout, run_with_timeout};
