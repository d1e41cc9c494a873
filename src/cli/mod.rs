//! CLI argument parsing for folio.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::context::DATA_ROOT_ENV;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// folio: soft-lock coordination for an archive shared through a common folder.
///
/// Every machine points at the same data root. Edits to the global settings
/// are exclusive; edits to single items only warn about other editors.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Shared data root folder.
    #[arg(long, global = true, env = DATA_ROOT_ENV)]
    pub root: Option<PathBuf>,

    /// Show debug logging on stderr.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for folio.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show this process's session identity.
    Session,

    /// Lock inspection and maintenance commands.
    Lock(LockCommand),

    /// Claim a resource and hold it until Enter is pressed.
    ///
    /// `settings` is exclusive: if another session holds it, folio names the
    /// holder and waits for a manual re-check. Items are advisory: another
    /// editor produces a warning only.
    Edit(EditArgs),
}

/// Arguments for the `edit` command.
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Resource key: `settings` or `photo:<relative path>`.
    pub key: String,

    /// Treat an item as exclusive, like the global settings.
    #[arg(long, action = ArgAction::SetTrue)]
    pub exclusive: bool,
}

/// Lock management command.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Lock subcommands.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show the state of one resource.
    Status(LockKeyArgs),

    /// List all lock records.
    List,

    /// Remove stale lock records.
    Prune(LockPruneArgs),

    /// Remove a lock record regardless of its holder.
    Clear(LockClearArgs),
}

/// Arguments naming one resource.
#[derive(Parser, Debug)]
pub struct LockKeyArgs {
    /// Resource key: `settings` or `photo:<relative path>`.
    pub key: String,
}

/// Arguments for `lock prune`.
#[derive(Parser, Debug)]
pub struct LockPruneArgs {
    /// Only prune this key; prunes every stale record when omitted.
    pub key: Option<String>,
}

/// Arguments for `lock clear`.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Resource key to clear.
    pub key: String,

    /// Clear even if the lock is live and held by another session.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
