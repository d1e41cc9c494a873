//! Command implementations for folio.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

mod edit;
mod lock;

use crate::cli::{Cli, Command, LockAction, LockCommand};
use crate::error::Result;
use crate::session::default_session_info;
use std::path::PathBuf;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Session => cmd_session(),
        Command::Lock(lock_cmd) => dispatch_lock(cli.root, lock_cmd),
        Command::Edit(args) => edit::cmd_edit(cli.root, args),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(root: Option<PathBuf>, lock_cmd: LockCommand) -> Result<()> {
    match lock_cmd.action {
        LockAction::Status(args) => lock::cmd_lock_status(root, args),
        LockAction::List => lock::cmd_lock_list(root),
        LockAction::Prune(args) => lock::cmd_lock_prune(root, args),
        LockAction::Clear(args) => lock::cmd_lock_clear(root, args),
    }
}

fn cmd_session() -> Result<()> {
    let session = default_session_info();

    println!("Session:  {}", session.session_id);
    println!("User:     {}", session.user_display_name);
    println!("Device:   {}", session.device_name);
    println!(
        "Started:  {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}
