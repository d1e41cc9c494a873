//! Folio: soft-lock coordination for an archive shared through a common folder.
//!
//! Several machines open the same data root, typically a cloud-synced
//! directory, and coordinate edits through small lock records stored under
//! `.folio/locks/`. The locks are advisory: they are renewed by a heartbeat,
//! expire when their holder stops renewing, and never block the file system.

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod session;

#[cfg(test)]
mod test_support;
