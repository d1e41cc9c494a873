//! Implementation of the `folio edit` command.
//!
//! A terminal stand-in for the two consumer screens: the exclusive settings
//! editor and the advisory per-item editor. The lock is held, with a running
//! heartbeat, until the user presses Enter.

use crate::cli::EditArgs;
use crate::context::DataRoot;
use crate::error::{FolioError, Result};
use crate::locks::{
    ClaimTicket, GateMode, GateOutcome, HeldLock, RenewOutcome, ResourceGate, ResourceKey,
    SoftLockService,
};
use crate::session::default_session_info;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Execute the `folio edit` command.
pub(super) fn cmd_edit(root: Option<PathBuf>, args: EditArgs) -> Result<()> {
    let data_root = DataRoot::resolve(root)?;
    let service = Arc::new(SoftLockService::open(&data_root)?);
    let key = ResourceKey::parse(&args.key)?;

    let mode = if args.exclusive {
        GateMode::Exclusive
    } else {
        GateMode::for_key(&key)
    };
    let gate = ResourceGate::new(service.clone(), key.clone(), default_session_info().clone(), mode);

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        match gate.evaluate()? {
            GateOutcome::Entered(ticket) => return hold(service, ticket, &mut input),
            GateOutcome::Blocked { holder } => {
                println!("{} is being edited by {}.", key, holder);
                let answer = prompt(
                    &mut input,
                    "Type r and press Enter to check again, or press Enter to give up: ",
                )?;
                if answer.eq_ignore_ascii_case("r") {
                    continue;
                }
                return Err(FolioError::LockHeld(format!(
                    "{} is being edited by {}",
                    key, holder
                )));
            }
            GateOutcome::Shared { others } => {
                let names: Vec<String> = others.iter().map(|s| s.to_string()).collect();
                println!(
                    "Warning: {} is also being edited by {}. Your edits are not blocked.",
                    key,
                    names.join(", ")
                );
                prompt(&mut input, "Press Enter when done editing: ")?;
                return Ok(());
            }
        }
    }
}

fn hold(
    service: Arc<SoftLockService>,
    ticket: ClaimTicket,
    input: &mut impl BufRead,
) -> Result<()> {
    let key = ticket.key.clone();
    let interval = service.heartbeat_interval();

    let held = HeldLock::with_heartbeat(service, ticket, |outcome| match outcome {
        RenewOutcome::Contested { other } => eprintln!(
            "Warning: {} also claimed this resource; both of you may be editing.",
            other
        ),
        RenewOutcome::Failed(reason) => {
            eprintln!("Warning: failed to renew lock: {}", reason)
        }
        RenewOutcome::Renewed | RenewOutcome::Recovered => {}
    })?;

    println!(
        "Editing {} (lock renewed every {}s).",
        key,
        interval.as_secs()
    );
    prompt(input, "Press Enter to finish and release the lock: ")?;

    held.release();
    println!("Released {}.", key);
    Ok(())
}

/// Print `message` and read one trimmed line. End of input reads as empty.
fn prompt(input: &mut impl BufRead, message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout()
        .flush()
        .map_err(|e| FolioError::UserError(format!("failed to write prompt: {}", e)))?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| FolioError::UserError(format!("failed to read input: {}", e)))?;
    Ok(line.trim().to_string())
}
