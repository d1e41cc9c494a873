//! Tests for the locks subsystem.

use super::*;
use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::error::FolioError;
use crate::fs::{atomic_write_gated, run_gated_with_timeout};
use crate::test_support::{create_test_root, session_service, test_clock, test_session};
use chrono::Duration;
use std::fs;
use std::sync::{Arc, Mutex};

fn photo() -> ResourceKey {
    ResourceKey::parse("photo:vacation/IMG_0001.jpg").unwrap()
}

// ============================================================================
// Service operations
// ============================================================================

#[test]
fn test_upsert_then_other_session_sees_claimant() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    for key in [ResourceKey::Settings, photo()] {
        service.upsert_lock(&key, &alex).unwrap();

        let others = service.active_other_sessions(&key, "some-other-session");
        assert_eq!(others, vec![alex.clone()]);
    }
}

#[test]
fn test_holder_sees_no_other_sessions() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    service.upsert_lock(&ResourceKey::Settings, &alex).unwrap();

    assert!(
        service
            .active_other_sessions(&ResourceKey::Settings, &alex.session_id)
            .is_empty()
    );
}

#[test]
fn test_no_record_means_no_other_sessions() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);

    assert!(service.active_other_sessions(&photo(), "anyone").is_empty());
}

#[test]
fn test_prune_removes_stale_record() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    service.upsert_lock(&photo(), &alex).unwrap();
    clock.advance(service.stale_threshold() + Duration::seconds(1));

    assert!(service.prune_stale_locks(&photo()));
    assert!(service.store().read(&photo()).is_none());
}

#[test]
fn test_prune_keeps_fresh_record() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    service.upsert_lock(&photo(), &alex).unwrap();
    clock.advance(Duration::seconds(30));

    assert!(!service.prune_stale_locks(&photo()));
    assert!(service.store().read(&photo()).is_some());
}

#[test]
fn test_prune_absent_record_is_noop() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);

    assert!(!service.prune_stale_locks(&ResourceKey::Settings));
}

#[test]
fn test_concurrent_prunes_of_same_record() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let alex = test_session("alex", "studio-mac");
    session_service(&root, &clock)
        .upsert_lock(&ResourceKey::Settings, &alex)
        .unwrap();
    clock.advance(Duration::minutes(10));

    // Two "machines" prune the same stale record; exactly one deletes it and
    // neither sees an error.
    let a = session_service(&root, &clock);
    let b = session_service(&root, &clock);
    let pruned_a = a.prune_stale_locks(&ResourceKey::Settings);
    let pruned_b = b.prune_stale_locks(&ResourceKey::Settings);

    assert!(pruned_a ^ pruned_b);
}

#[test]
fn test_remove_lock_is_idempotent() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    // No record has ever existed for this key.
    service.remove_lock(&photo(), &alex.session_id);

    service.upsert_lock(&photo(), &alex).unwrap();
    service.remove_lock(&photo(), &alex.session_id);
    service.remove_lock(&photo(), &alex.session_id);

    assert!(service.store().read(&photo()).is_none());
}

#[test]
fn test_remove_lock_does_not_verify_holder() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    service.upsert_lock(&ResourceKey::Settings, &alex).unwrap();
    service.remove_lock(&ResourceKey::Settings, "not-alex");

    assert!(service.store().read(&ResourceKey::Settings).is_none());
}

#[test]
fn test_upsert_round_trip_preserves_identity() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("Alex Müller", "studio-mac.local");
    let key = ResourceKey::item("Urlaub/日本/IMG 0001.jpg").unwrap();

    let written = service.upsert_lock(&key, &alex).unwrap();
    let read = service.store().read(&key).unwrap();

    assert_eq!(read.holder, alex);
    assert_eq!(read.resource_key, key.as_key_string());
    assert_eq!(read.claimed_at, written.claimed_at);
    assert_eq!(read.last_renewed_at, clock.now());
}

#[test]
fn test_renewals_keep_claimed_at() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let first = service.upsert_lock(&ResourceKey::Settings, &alex).unwrap();
    clock.advance(Duration::seconds(30));
    let second = service.upsert_lock(&ResourceKey::Settings, &alex).unwrap();

    assert_eq!(second.claimed_at, first.claimed_at);
    assert_eq!(second.last_renewed_at, first.last_renewed_at + Duration::seconds(30));
    assert_eq!(second.claim_token, first.claim_token);
}

#[test]
fn test_simultaneous_upserts_both_succeed() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let a = session_service(&root, &clock);
    let b = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let sam = test_session("sam", "laptop");

    // Neither sees the other before claiming, so both claim.
    assert!(a.active_other_sessions(&ResourceKey::Settings, &alex.session_id).is_empty());
    assert!(b.active_other_sessions(&ResourceKey::Settings, &sam.session_id).is_empty());
    a.upsert_lock(&ResourceKey::Settings, &alex).unwrap();
    b.upsert_lock(&ResourceKey::Settings, &sam).unwrap();

    // Last writer wins on disk.
    let record = a.store().read(&ResourceKey::Settings).unwrap();
    assert_eq!(record.holder, sam);
}

#[test]
fn test_timed_out_write_never_resurrects_released_lock() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let key = ResourceKey::Settings;

    let held = service.upsert_lock(&key, &alex).unwrap();
    let path = service.store().path_for(&key);
    let json = LockRecord::upsert(Some(&held), &key, &alex, clock.now())
        .to_json()
        .unwrap();

    // A renewal stuck on a slow share until after its deadline.
    let err = run_gated_with_timeout(Some(std::time::Duration::from_millis(20)), move |gate| {
        std::thread::sleep(std::time::Duration::from_millis(200));
        atomic_write_gated(&path, json.as_bytes(), gate)
    })
    .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);

    service.remove_lock(&key, &alex.session_id);
    assert!(service.store().read(&key).is_none());

    // Give the stuck worker time to finish.
    std::thread::sleep(std::time::Duration::from_millis(500));
    assert!(service.store().read(&key).is_none());

    let leftovers: Vec<_> = fs::read_dir(service.store().locks_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_upsert_failure_is_store_error() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    fs::create_dir_all(&root.state_dir).unwrap();
    // Occupy the locks directory path with a file.
    fs::write(&root.locks_dir, "blocked").unwrap();
    let service = session_service(&root, &clock);

    let err = service
        .upsert_lock(&ResourceKey::Settings, &test_session("alex", "studio"))
        .unwrap_err();
    assert!(matches!(err, FolioError::StoreError(_)));
}

#[test]
fn test_lock_state_classification() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let key = ResourceKey::Settings;

    assert_eq!(service.lock_state(&key, &alex.session_id), LockState::Unclaimed);

    service.upsert_lock(&key, &alex).unwrap();
    assert!(matches!(
        service.lock_state(&key, &alex.session_id),
        LockState::HeldByMe(_)
    ));
    assert!(matches!(
        service.lock_state(&key, "someone-else"),
        LockState::HeldByOther(_)
    ));

    clock.advance(Duration::minutes(5));
    let state = service.lock_state(&key, "someone-else");
    assert_eq!(state.label(), "stale");
    assert_eq!(state.record().unwrap().holder, alex);

    // Reading state never prunes.
    assert!(service.store().read(&key).is_some());
}

#[test]
fn test_list_and_prune_all_stale() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let old = ResourceKey::item("old.jpg").unwrap();

    service.upsert_lock(&old, &alex).unwrap();
    clock.advance(Duration::minutes(5));
    service.upsert_lock(&ResourceKey::Settings, &alex).unwrap();

    let listed = service.list_locks();
    assert_eq!(listed.len(), 2);
    let stale: Vec<_> = listed.iter().filter(|l| l.is_stale).map(|l| &l.key).collect();
    assert_eq!(stale, vec![&old]);
    assert!(listed[1].to_string().contains("STALE"));

    let pruned = service.prune_all_stale();
    assert_eq!(pruned.len(), 1);
    assert_eq!(pruned[0].resource_key, "photo:old.jpg");
    assert_eq!(service.list_locks().len(), 1);
}

#[test]
fn test_clock_skew_future_record_not_pruned() {
    let (_temp_dir, root) = create_test_root();
    let fast_clock = test_clock();
    fast_clock.advance(Duration::minutes(10));
    let slow_clock = test_clock();

    let fast = session_service(&root, &fast_clock);
    let slow = session_service(&root, &slow_clock);
    let alex = test_session("alex", "fast-machine");

    fast.upsert_lock(&ResourceKey::Settings, &alex).unwrap();

    assert!(!slow.prune_stale_locks(&ResourceKey::Settings));
    assert_eq!(
        slow.active_other_sessions(&ResourceKey::Settings, "slow-session"),
        vec![alex]
    );
}

// ============================================================================
// Heartbeat
// ============================================================================

#[test]
fn test_heartbeat_renewals_survive_concurrent_prunes() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let holder_service = session_service(&root, &clock);
    let other_service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let key = ResourceKey::Settings;

    let record = holder_service.upsert_lock(&key, &alex).unwrap();
    let interval = holder_service.heartbeat_interval();
    let mut heartbeat = Heartbeat::new(
        ClaimTicket::from_record(key.clone(), &record),
        interval,
        clock.now(),
    );

    for _ in 0..20 {
        // The other session checks just before each renewal is due.
        clock.advance(Duration::from_std(interval).unwrap() - Duration::seconds(1));
        assert!(!other_service.prune_stale_locks(&key));
        assert_eq!(heartbeat.poll(&holder_service), None);

        clock.advance(Duration::seconds(1));
        assert_eq!(heartbeat.poll(&holder_service), Some(RenewOutcome::Renewed));
        assert!(!other_service.prune_stale_locks(&key));
    }

    let record = other_service.store().read(&key).unwrap();
    assert_eq!(record.holder, alex);
    assert_eq!(record.last_renewed_at, clock.now());
}

#[test]
fn test_heartbeat_schedule_and_cancel() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let record = service.upsert_lock(&photo(), &alex).unwrap();
    let mut heartbeat = Heartbeat::new(
        ClaimTicket::from_record(photo(), &record),
        std::time::Duration::from_secs(30),
        clock.now(),
    );
    assert_eq!(heartbeat.next_due(), clock.now() + Duration::seconds(30));

    clock.advance(Duration::seconds(45));
    assert_eq!(heartbeat.poll(&service), Some(RenewOutcome::Renewed));
    assert_eq!(heartbeat.next_due(), clock.now() + Duration::seconds(30));

    heartbeat.cancel();
    assert!(heartbeat.is_cancelled());
    clock.advance(Duration::minutes(10));
    assert_eq!(heartbeat.poll(&service), None);

    // A cancelled heartbeat leaves the record to go stale.
    assert!(service.prune_stale_locks(&photo()));
}

#[test]
fn test_renew_detects_takeover() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let a = session_service(&root, &clock);
    let b = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let sam = test_session("sam", "laptop");
    let key = ResourceKey::Settings;

    let record = a.upsert_lock(&key, &alex).unwrap();
    let mut ticket = ClaimTicket::from_record(key.clone(), &record);

    // Alex's machine sleeps past the threshold; Sam prunes and claims.
    clock.advance(Duration::minutes(5));
    assert!(b.active_other_sessions(&key, &sam.session_id).is_empty());
    b.upsert_lock(&key, &sam).unwrap();

    let outcome = a.renew(&mut ticket);
    assert_eq!(outcome, RenewOutcome::Contested { other: sam.clone() });
    assert_ne!(ticket.claim_token, record.claim_token);

    // The renewal still wrote the record, exactly as an upsert would.
    assert_eq!(a.store().read(&key).unwrap().holder, alex);
}

#[test]
fn test_renew_recovers_vanished_record() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let record = service.upsert_lock(&photo(), &alex).unwrap();
    let mut ticket = ClaimTicket::from_record(photo(), &record);
    service.store().delete(&photo()).unwrap();

    assert_eq!(service.renew(&mut ticket), RenewOutcome::Recovered);
    assert_eq!(
        service.store().read(&photo()).unwrap().claim_token,
        ticket.claim_token
    );
}

#[test]
fn test_renew_failure_is_swallowed() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let record = service.upsert_lock(&photo(), &alex).unwrap();
    let mut ticket = ClaimTicket::from_record(photo(), &record);

    fs::remove_dir_all(&root.locks_dir).unwrap();
    fs::write(&root.locks_dir, "blocked").unwrap();

    assert!(matches!(service.renew(&mut ticket), RenewOutcome::Failed(_)));
}

#[test]
fn test_heartbeat_handle_renews_and_stops() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let config = Config {
        lock_stale_seconds: 3,
        heartbeat_interval_seconds: 1,
        io_timeout_seconds: 5,
    };
    let service = Arc::new(SoftLockService::with_clock(
        LockStore::for_root(&root, &config),
        &config,
        clock.clone(),
    ));
    let alex = test_session("alex", "studio-mac");
    let record = service.upsert_lock(&photo(), &alex).unwrap();

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let seen = outcomes.clone();
    let heartbeat = Heartbeat::new(
        ClaimTicket::from_record(photo(), &record),
        std::time::Duration::from_millis(20),
        clock.now(),
    );
    let handle = HeartbeatHandle::spawn(service.clone(), heartbeat, move |outcome| {
        seen.lock().unwrap().push(outcome.clone());
    })
    .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(150));
    let finished = handle.cancel().unwrap();
    assert!(finished.is_cancelled());

    let count = outcomes.lock().unwrap().len();
    assert!(count >= 1);
    assert!(outcomes.lock().unwrap().iter().all(|o| *o == RenewOutcome::Renewed));

    // No tick after cancel returns: a deleted record stays deleted.
    service.store().delete(&photo()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(60));
    assert!(service.store().read(&photo()).is_none());
    assert_eq!(outcomes.lock().unwrap().len(), count);
}

// ============================================================================
// Gates
// ============================================================================

fn gate(
    service: &Arc<SoftLockService<ManualClock>>,
    key: ResourceKey,
    session: &crate::session::SessionIdentity,
) -> ResourceGate<ManualClock> {
    let mode = GateMode::for_key(&key);
    ResourceGate::new(service.clone(), key, session.clone(), mode)
}

#[test]
fn test_gate_modes_by_key() {
    assert_eq!(GateMode::for_key(&ResourceKey::Settings), GateMode::Exclusive);
    assert_eq!(GateMode::for_key(&photo()), GateMode::Advisory);
}

#[test]
fn scenario_settings_blocked_until_release() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let a_service = session_service(&root, &clock);
    let b_service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let sam = test_session("sam", "laptop");

    let a_gate = gate(&a_service, ResourceKey::Settings, &alex);
    let b_gate = gate(&b_service, ResourceKey::Settings, &sam);

    let GateOutcome::Entered(ticket) = a_gate.evaluate().unwrap() else {
        panic!("alex should enter");
    };
    let held = HeldLock::new(a_service.clone(), ticket);

    assert_eq!(
        b_service.active_other_sessions(&ResourceKey::Settings, &sam.session_id),
        vec![alex.clone()]
    );
    assert_eq!(
        b_gate.evaluate().unwrap(),
        GateOutcome::Blocked {
            holder: alex.clone()
        }
    );

    held.release();

    // Sam's manual "check again".
    let GateOutcome::Entered(ticket) = b_gate.evaluate().unwrap() else {
        panic!("sam should enter after release");
    };
    assert_eq!(ticket.holder, sam);
}

#[test]
fn scenario_crashed_item_holder_goes_stale() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let a_service = session_service(&root, &clock);
    let b_service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let sam = test_session("sam", "laptop");
    let key = photo();

    a_service.upsert_lock(&key, &alex).unwrap();
    // Alex crashes: no heartbeat, no release.
    drop(a_service);

    assert_eq!(
        b_service.active_other_sessions(&key, &sam.session_id),
        vec![alex]
    );

    clock.advance(b_service.stale_threshold() + Duration::seconds(1));
    b_service.prune_stale_locks(&key);
    assert!(b_service.active_other_sessions(&key, &sam.session_id).is_empty());
    b_service.upsert_lock(&key, &sam).unwrap();
    assert_eq!(b_service.store().read(&key).unwrap().holder, sam);
}

#[test]
fn test_advisory_gate_shares_without_claiming() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let a_service = session_service(&root, &clock);
    let b_service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");
    let sam = test_session("sam", "laptop");

    let a_record = a_service.upsert_lock(&photo(), &alex).unwrap();

    let outcome = gate(&b_service, photo(), &sam).evaluate().unwrap();
    assert_eq!(outcome, GateOutcome::Shared { others: vec![alex] });

    // Alex's record is untouched.
    assert_eq!(b_service.store().read(&photo()).unwrap(), a_record);
}

#[test]
fn test_gate_claim_failure_surfaces() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    fs::create_dir_all(&root.state_dir).unwrap();
    fs::write(&root.locks_dir, "blocked").unwrap();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let err = gate(&service, ResourceKey::Settings, &alex)
        .evaluate()
        .unwrap_err();
    assert!(matches!(err, FolioError::ClaimFailed(_)));
}

#[test]
fn test_held_lock_released_on_drop() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    {
        let GateOutcome::Entered(ticket) = gate(&service, ResourceKey::Settings, &alex)
            .evaluate()
            .unwrap()
        else {
            panic!("should enter");
        };
        let _held = HeldLock::new(service.clone(), ticket);
        assert!(service.store().read(&ResourceKey::Settings).is_some());
    }

    assert!(service.store().read(&ResourceKey::Settings).is_none());
}

#[test]
fn test_held_lock_with_heartbeat_releases_cleanly() {
    let (_temp_dir, root) = create_test_root();
    let clock = test_clock();
    let service = session_service(&root, &clock);
    let alex = test_session("alex", "studio-mac");

    let GateOutcome::Entered(ticket) = gate(&service, photo(), &alex).evaluate().unwrap() else {
        panic!("should enter");
    };
    let held = HeldLock::with_heartbeat(service.clone(), ticket, |_| {}).unwrap();
    assert!(held.has_heartbeat());
    assert_eq!(held.ticket().key, photo());

    held.release();
    assert!(service.store().read(&photo()).is_none());
}

// ============================================================================
// Root-addressed API
// ============================================================================

#[test]
fn test_root_api_round_trip() {
    let (temp_dir, _root) = create_test_root();
    let path = temp_dir.path();
    let alex = test_session("alex", "studio-mac");

    upsert_lock(path, &ResourceKey::Settings, &alex).unwrap();
    assert_eq!(
        active_other_sessions(path, &ResourceKey::Settings, "other"),
        vec![alex.clone()]
    );

    prune_stale_locks(path, &ResourceKey::Settings);
    assert_eq!(
        active_other_sessions(path, &ResourceKey::Settings, "other").len(),
        1
    );

    remove_lock(path, &ResourceKey::Settings, &alex.session_id);
    assert!(active_other_sessions(path, &ResourceKey::Settings, "other").is_empty());
}

#[test]
fn test_root_api_missing_root() {
    let (temp_dir, _root) = create_test_root();
    let missing = temp_dir.path().join("unmounted");
    let alex = test_session("alex", "studio-mac");

    assert!(active_other_sessions(&missing, &ResourceKey::Settings, "x").is_empty());
    remove_lock(&missing, &ResourceKey::Settings, &alex.session_id);
    assert!(matches!(
        upsert_lock(&missing, &ResourceKey::Settings, &alex),
        Err(FolioError::UserError(_))
    ));
}
