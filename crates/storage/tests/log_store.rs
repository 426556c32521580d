use ritual_core::ids::{HabitId, UserId};
use ritual_core::{DateRange, HabitPatch, LogDate, LogEntry, LogScope, LogStore, NewHabit, RemoteError};
use ritual_storage::SqliteLogStore;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!(
        "ritual-remote-{label}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&path).expect("temp storage dir must be creatable");
    path
}

fn fixed_clock() -> i64 {
    1_717_200_000_000
}

fn user(raw: &str) -> UserId {
    UserId::try_new(raw).expect("user id")
}

fn habit_id(raw: &str) -> HabitId {
    HabitId::try_new(raw).expect("habit id")
}

fn day(raw: &str) -> LogDate {
    LogDate::parse(raw).expect("date")
}

fn all_of_2024() -> DateRange {
    DateRange::calendar_year(day("2024-06-01"))
}

fn open(label: &str) -> SqliteLogStore {
    SqliteLogStore::open(temp_storage_dir(label))
        .expect("remote store opens")
        .with_clock(fixed_clock)
}

#[test]
fn create_habit_is_idempotent_by_id() {
    let mut store = open("create-idempotent");
    let new = NewHabit::daily(habit_id("h1"), user("u1"), "Read");

    let first = store.create_habit(&new).expect("create");
    assert_eq!(first.created_at_ms, fixed_clock());
    assert_eq!(first.color, "#3b82f6");

    let mut renamed = new.clone();
    renamed.name = "Other".to_string();
    let second = store.create_habit(&renamed).expect("create again");
    assert_eq!(second, first);
    assert_eq!(store.find_habits(&user("u1")).expect("habits").len(), 1);

    let mut stolen = new;
    stolen.user_id = user("u2");
    assert!(matches!(
        store.create_habit(&stolen),
        Err(RemoteError::Rejected(_))
    ));
}

#[test]
fn upsert_log_keeps_one_row_per_habit_and_date() {
    let mut store = open("upsert");
    store
        .create_habit(&NewHabit::daily(habit_id("h1"), user("u1"), "Read"))
        .expect("create");

    let entry = LogEntry::new(habit_id("h1"), day("2024-06-03"), true);
    let first = store.upsert_log(&entry).expect("upsert");
    let again = store.upsert_log(&entry).expect("upsert again");
    assert_eq!(first, again);

    let undone = LogEntry::new(habit_id("h1"), day("2024-06-03"), false);
    let flipped = store.upsert_log(&undone).expect("flip");
    assert!(!flipped.completed);
    assert_eq!(flipped.value, 0.0);

    let all = store.list_logs(&habit_id("h1"), all_of_2024()).expect("logs");
    assert_eq!(all.len(), 1);
    let completed = store
        .list_completed_logs(&LogScope::Habit(habit_id("h1")), all_of_2024())
        .expect("completed");
    assert!(completed.is_empty());
}

#[test]
fn progress_value_defaults_follow_completion() {
    let mut store = open("values");
    store
        .create_habit(&NewHabit::daily(habit_id("h1"), user("u1"), "Water"))
        .expect("create");
    let mut entry = LogEntry::new(habit_id("h1"), day("2024-06-03"), true);
    entry.value = Some(3.5);
    assert_eq!(store.upsert_log(&entry).expect("upsert").value, 3.5);
    entry.value = Some(0.0);
    assert_eq!(store.upsert_log(&entry).expect("upsert").value, 1.0);
}

#[test]
fn completed_logs_are_scoped_and_newest_first() {
    let mut store = open("scope");
    for (id, owner) in [("a", "u1"), ("b", "u1"), ("c", "u2")] {
        store
            .create_habit(&NewHabit::daily(habit_id(id), user(owner), id))
            .expect("create");
    }
    for (id, date) in [("a", "2024-06-01"), ("b", "2024-06-03"), ("c", "2024-06-02"), ("a", "2023-12-31")] {
        store
            .upsert_log(&LogEntry::new(habit_id(id), day(date), true))
            .expect("log");
    }

    let logs = store
        .list_completed_logs(&LogScope::User(user("u1")), all_of_2024())
        .expect("user logs");
    let dates = logs.iter().map(|l| l.date.to_string()).collect::<Vec<_>>();
    assert_eq!(dates, vec!["2024-06-03", "2024-06-01"]);
}

#[test]
fn writes_against_unknown_habits_are_rejected() {
    let mut store = open("unknown");
    let entry = LogEntry::new(habit_id("ghost"), day("2024-06-03"), true);
    assert!(matches!(store.upsert_log(&entry), Err(RemoteError::Rejected(_))));

    let mut patch = HabitPatch::for_habit(habit_id("ghost"));
    patch.name = Some("Boo".to_string());
    assert!(matches!(store.update_habit(&patch), Err(RemoteError::Rejected(_))));
    assert!(matches!(
        store.update_habit_streak(&habit_id("ghost"), 1, 1),
        Err(RemoteError::Rejected(_))
    ));

    store.delete_habit(&habit_id("ghost")).expect("deleting a missing habit succeeds");
}

#[test]
fn delete_removes_habit_and_logs() {
    let mut store = open("delete");
    store
        .create_habit(&NewHabit::daily(habit_id("h1"), user("u1"), "Read"))
        .expect("create");
    store
        .upsert_log(&LogEntry::new(habit_id("h1"), day("2024-06-03"), true))
        .expect("log");
    let updated = store.update_habit_streak(&habit_id("h1"), 1, 4).expect("streak");
    assert_eq!((updated.current_streak, updated.longest_streak), (1, 4));

    store.delete_habit(&habit_id("h1")).expect("delete");
    assert!(store.find_habit(&habit_id("h1")).expect("find").is_none());
    assert!(store.list_logs(&habit_id("h1"), all_of_2024()).expect("logs").is_empty());
}
