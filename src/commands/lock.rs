//! Implementation of the `folio lock` subcommands.

use crate::cli::{LockClearArgs, LockKeyArgs, LockPruneArgs};
use crate::clock::Clock;
use crate::context::DataRoot;
use crate::error::{FolioError, Result};
use crate::locks::{LockRecord, LockState, ResourceKey, SoftLockService};
use crate::session::current_session_id;
use std::path::PathBuf;

fn open(root: Option<PathBuf>) -> Result<SoftLockService> {
    let data_root = DataRoot::resolve(root)?;
    SoftLockService::open(&data_root)
}

fn print_record(record: &LockRecord, now: chrono::DateTime<chrono::Utc>) {
    println!("    Holder:     {}", record.holder);
    println!("    Session:    {}", record.holder.session_id);
    println!(
        "    Claimed:    {}",
        record.claimed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "    Renewed:    {} ({} ago)",
        record.last_renewed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        record.age_string(now)
    );
}

pub(super) fn cmd_lock_status(root: Option<PathBuf>, args: LockKeyArgs) -> Result<()> {
    let service = open(root)?;
    let key = ResourceKey::parse(&args.key)?;

    let state = service.lock_state(&key, current_session_id());
    println!("{}: {}", key, state.label());

    if let Some(record) = state.record() {
        print_record(record, service.clock().now());
    }
    if let LockState::Stale(_) = state {
        println!(
            "    Status:     STALE (not renewed within {}s); the next check will prune it",
            service.stale_threshold().num_seconds()
        );
    }

    Ok(())
}

pub(super) fn cmd_lock_list(root: Option<PathBuf>) -> Result<()> {
    let service = open(root)?;
    let locks = service.list_locks();

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", locks.len());
    println!();

    let now = service.clock().now();
    for lock in &locks {
        println!("  {}:", lock.key);
        print_record(&lock.record, now);
        if lock.is_stale {
            println!(
                "    Status:     STALE (exceeds {}s threshold)",
                service.stale_threshold().num_seconds()
            );
        }
        println!("    Path:       {}", lock.path.display());
        println!();
    }

    let stale_count = locks.iter().filter(|l| l.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `folio lock prune` to remove them.",
            stale_count
        );
    }

    Ok(())
}

pub(super) fn cmd_lock_prune(root: Option<PathBuf>, args: LockPruneArgs) -> Result<()> {
    let service = open(root)?;

    let pruned: Vec<LockRecord> = match args.key {
        Some(key) => {
            let key = ResourceKey::parse(&key)?;
            let record = service.store().read(&key);
            match record {
                Some(record) if service.prune_stale_locks(&key) => vec![record],
                _ => Vec::new(),
            }
        }
        None => service.prune_all_stale(),
    };

    if pruned.is_empty() {
        println!("No stale locks.");
        return Ok(());
    }

    for record in &pruned {
        println!("Pruned stale lock: {} (was held by {})", record.resource_key, record.holder);
    }

    Ok(())
}

pub(super) fn cmd_lock_clear(root: Option<PathBuf>, args: LockClearArgs) -> Result<()> {
    let service = open(root)?;
    let key = ResourceKey::parse(&args.key)?;

    let record = match service.lock_state(&key, current_session_id()) {
        LockState::Unclaimed => {
            return Err(FolioError::UserError(format!("lock '{}' does not exist", key)));
        }
        LockState::HeldByOther(record) if !args.force => {
            return Err(FolioError::UserError(format!(
                "refusing to clear a live lock without --force flag.\n\n\
                 '{}' is held by {} and was renewed {} ago.\n\
                 Clearing it lets another session edit while {} still believes it holds the lock.\n\n\
                 To clear the lock, run:\n  folio lock clear {} --force",
                key,
                record.holder,
                record.age_string(service.clock().now()),
                record.holder.user_display_name,
                key
            )));
        }
        LockState::HeldByMe(record) | LockState::HeldByOther(record) | LockState::Stale(record) => {
            record
        }
    };

    // An explicit user action, so unlike a release a failure is reported.
    service.store().delete(&key)?;
    tracing::info!(key = %key, holder = %record.holder, force = args.force, "lock cleared");

    println!("Cleared lock: {}", key);
    println!();
    println!("Lock details:");
    print_record(&record, service.clock().now());

    Ok(())
}
