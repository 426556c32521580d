#![forbid(unsafe_code)]

mod support;

use ritual_core::{LogStore, MutationKind, StreakSummary};
use ritual_sync::{DrainStop, SyncEvent, SyncState};
use support::*;

#[test]
fn drain_applies_mutations_in_enqueue_order() {
    let h = harness("fifo", true);
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    for date in ["2024-06-08", "2024-06-09", "2024-06-10"] {
        h.engine.enqueue_mutation(log("h1", date, true)).expect("log");
    }

    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.stop, DrainStop::Drained);
    assert_eq!(report.applied.len(), 4);
    assert!(report.failed.is_empty());
    assert_eq!(report.remaining, 0);
    assert_eq!(
        h.writes(),
        vec![
            "CREATE h1",
            "LOG h1 2024-06-08 true",
            "LOG h1 2024-06-09 true",
            "LOG h1 2024-06-10 true",
        ]
    );

    let fresh = h.engine.habit_streak(&habit_id("h1")).expect("streak");
    assert_eq!(
        fresh,
        StreakSummary {
            current_streak: 3,
            longest_streak: 3
        }
    );
    let stored = h.server().find_habit(&habit_id("h1")).expect("find").expect("present");
    assert_eq!((stored.current_streak, stored.longest_streak), (3, 3));
    let mirrored = h.engine.mirror_habit(&habit_id("h1")).expect("mirror").expect("present");
    assert_eq!(mirrored.current_streak, 3);
}

#[test]
fn later_log_for_the_same_date_wins() {
    let h = harness("supersede", true);
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    h.engine.enqueue_mutation(log("h1", "2024-06-10", true)).expect("done");
    h.engine.enqueue_mutation(log("h1", "2024-06-10", false)).expect("undone");

    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.applied.len(), 3);

    let range = ritual_core::DateRange::trailing_days(day("2024-06-10"), 30);
    let logs = h.server().list_logs(&habit_id("h1"), range).expect("logs");
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].completed);
    assert_eq!(h.engine.habit_streak(&habit_id("h1")).expect("streak").current_streak, 0);
}

#[test]
fn transient_failure_aborts_the_pass_and_keeps_the_tail() {
    let h = harness("transient", true);
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    let second = h.engine.enqueue_mutation(log("h1", "2024-06-09", true)).expect("log 1");
    let third = h.engine.enqueue_mutation(log("h1", "2024-06-10", true)).expect("log 2");
    h.script().fail_from_write = Some(1);

    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.remaining, 2);
    assert!(matches!(&report.stop, DrainStop::Transient { id, .. } if *id == second.id));
    assert_eq!(h.engine.state(), SyncState::Idle);

    let queued = h
        .engine
        .pending()
        .expect("pending")
        .into_iter()
        .map(|p| p.id)
        .collect::<Vec<_>>();
    assert_eq!(queued, vec![second.id.clone(), third.id.clone()]);

    h.script().fail_from_write = None;
    let retry = h.engine.drain_queue().expect("retry");
    assert_eq!(retry.applied, vec![second.id, third.id]);
    assert_eq!(retry.remaining, 0);
    assert_eq!(h.writes().len(), 3);
}

#[test]
fn permanent_rejection_is_reported_and_skipped() {
    let h = harness("permanent", true);
    let events = h.engine.subscribe();
    h.script().reject_habits.push(habit_id("bad"));

    h.engine.enqueue_mutation(create("good", "Read")).expect("create good");
    h.engine.enqueue_mutation(create("bad", "Nope")).expect("create bad");
    h.engine.enqueue_mutation(log("bad", "2024-06-10", true)).expect("log bad");
    h.engine.enqueue_mutation(log("good", "2024-06-10", true)).expect("log good");

    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.stop, DrainStop::Drained);
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.remaining, 0);
    let failed_kinds = report.failed.iter().map(|f| f.kind).collect::<Vec<_>>();
    assert_eq!(failed_kinds, vec![MutationKind::CreateHabit, MutationKind::LogHabit]);
    assert!(report.failed.iter().all(|f| f.habit_id == habit_id("bad")));

    // The store never knew the rejected habit, so the mirror forgets it too.
    assert!(h.engine.mirror_habit(&habit_id("bad")).expect("mirror").is_none());
    assert!(h.engine.mirror_habit(&habit_id("good")).expect("mirror").is_some());

    let rejected = events
        .try_iter()
        .filter(|e| matches!(e, SyncEvent::MutationRejected { .. }))
        .count();
    assert_eq!(rejected, 2);
}

#[test]
fn losing_connectivity_mid_pass_stops_between_mutations() {
    let h = harness("offline-mid-pass", true);
    h.script().offline_after_writes = Some((1, h.flag.clone()));
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    h.engine.enqueue_mutation(log("h1", "2024-06-10", true)).expect("log");

    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.stop, DrainStop::Offline);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.remaining, 1);
}

#[test]
fn offline_drain_attempts_nothing() {
    let h = harness("offline", false);
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    let report = h.engine.drain_queue().expect("drain");
    assert_eq!(report.stop, DrainStop::Offline);
    assert!(report.applied.is_empty());
    assert_eq!(report.remaining, 1);
    assert!(h.writes().is_empty());
}

#[test]
fn second_trigger_during_a_pass_is_a_no_op() {
    let h = harness("reentrant", true);
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");
    let (entered_tx, entered_rx) = crossbeam::channel::bounded(1);
    let (release_tx, release_rx) = crossbeam::channel::bounded(1);
    h.script().gate = Some((entered_tx, release_rx));

    std::thread::scope(|scope| {
        let first = scope.spawn(|| h.engine.drain_queue());
        entered_rx.recv().expect("first pass reaches the store");

        assert_eq!(h.engine.state(), SyncState::Syncing);
        let second = h.engine.drain_queue().expect("second trigger");
        assert_eq!(second.stop, DrainStop::AlreadySyncing);
        assert!(second.applied.is_empty());
        assert_eq!(second.remaining, 1);

        release_tx.send(()).expect("release");
        let report = first.join().expect("no panic").expect("first pass");
        assert_eq!(report.applied.len(), 1);
    });

    assert_eq!(h.engine.state(), SyncState::Idle);
    assert_eq!(h.writes(), vec!["CREATE h1"]);
}

#[test]
fn coming_back_online_starts_a_pass() {
    let h = harness("edge", false);
    let events = h.engine.subscribe();
    h.engine.enqueue_mutation(create("h1", "Read")).expect("create");

    assert!(h.engine.poll_connectivity().expect("poll").is_none());

    h.flag.set_online(true);
    let report = h
        .engine
        .poll_connectivity()
        .expect("poll")
        .expect("online edge drains");
    assert_eq!(report.applied.len(), 1);
    assert!(h.engine.poll_connectivity().expect("poll").is_none());

    h.flag.set_online(false);
    assert!(h.engine.poll_connectivity().expect("poll").is_none());

    let changes = events
        .try_iter()
        .filter_map(|e| match e {
            SyncEvent::ConnectivityChanged { online } => Some(online),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(changes, vec![true, false]);
}
