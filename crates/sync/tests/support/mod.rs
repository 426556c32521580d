#![forbid(unsafe_code)]
#![allow(dead_code)]

use crossbeam::channel::{Receiver, Sender};
use ritual_core::ids::{HabitId, UserId};
use ritual_core::{
    CompletionLog, DateRange, Habit, HabitPatch, LogDate, LogEntry, LogScope, LogStore, Mutation,
    NewHabit, RemoteError,
};
use ritual_storage::{LocalStore, SqliteLogStore};
use ritual_sync::{FixedClock, OnlineFlag, SyncConfig, SyncEngine};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use time::{Date, Month, OffsetDateTime, Time};

pub(crate) fn temp_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!("ritual-sync-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&path).expect("temp dir must be creatable");
    path
}

/// Scripted faults injected in front of a real store.
#[derive(Default)]
pub(crate) struct Script {
    /// Writes from this index on fail as unavailable (0-based, failed attempts not counted).
    pub(crate) fail_from_write: Option<usize>,
    pub(crate) reject_habits: Vec<HabitId>,
    pub(crate) offline_after_writes: Option<(usize, OnlineFlag)>,
    /// First write announces itself on the sender, then waits on the receiver.
    pub(crate) gate: Option<(Sender<()>, Receiver<()>)>,
    pub(crate) writes: Vec<String>,
}

pub(crate) struct FlakyStore {
    inner: SqliteLogStore,
    script: Arc<Mutex<Script>>,
}

impl FlakyStore {
    fn before_write(&self, label: String, habit_id: &HabitId) -> Result<(), RemoteError> {
        let gate = self.script.lock().expect("script lock").gate.take();
        if let Some((entered, release)) = gate {
            entered.send(()).expect("test is listening");
            release.recv().expect("test releases the gate");
        }

        let mut script = self.script.lock().expect("script lock");
        if script
            .fail_from_write
            .is_some_and(|from| script.writes.len() >= from)
        {
            return Err(RemoteError::Unavailable("connection reset".to_string()));
        }
        if script.reject_habits.contains(habit_id) {
            return Err(RemoteError::Rejected(format!("habit {habit_id} is locked")));
        }
        script.writes.push(label);
        if let Some((after, flag)) = &script.offline_after_writes
            && script.writes.len() == *after
        {
            flag.set_online(false);
        }
        Ok(())
    }
}

impl LogStore for FlakyStore {
    fn find_habits(&mut self, user_id: &UserId) -> Result<Vec<Habit>, RemoteError> {
        self.inner.find_habits(user_id)
    }

    fn find_habit(&mut self, habit_id: &HabitId) -> Result<Option<Habit>, RemoteError> {
        self.inner.find_habit(habit_id)
    }

    fn create_habit(&mut self, habit: &NewHabit) -> Result<Habit, RemoteError> {
        self.before_write(format!("CREATE {}", habit.id), &habit.id)?;
        self.inner.create_habit(habit)
    }

    fn update_habit(&mut self, patch: &HabitPatch) -> Result<Habit, RemoteError> {
        self.before_write(format!("UPDATE {}", patch.habit_id), &patch.habit_id)?;
        self.inner.update_habit(patch)
    }

    fn delete_habit(&mut self, habit_id: &HabitId) -> Result<(), RemoteError> {
        self.before_write(format!("DELETE {habit_id}"), habit_id)?;
        self.inner.delete_habit(habit_id)
    }

    fn upsert_log(&mut self, entry: &LogEntry) -> Result<CompletionLog, RemoteError> {
        self.before_write(
            format!("LOG {} {} {}", entry.habit_id, entry.date, entry.completed),
            &entry.habit_id,
        )?;
        self.inner.upsert_log(entry)
    }

    fn list_completed_logs(
        &mut self,
        scope: &LogScope,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError> {
        self.inner.list_completed_logs(scope, range)
    }

    fn list_logs(
        &mut self,
        habit_id: &HabitId,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError> {
        self.inner.list_logs(habit_id, range)
    }

    fn update_habit_streak(
        &mut self,
        habit_id: &HabitId,
        current_streak: u32,
        longest_streak: u32,
    ) -> Result<Habit, RemoteError> {
        self.inner
            .update_habit_streak(habit_id, current_streak, longest_streak)
    }
}

pub(crate) struct Harness {
    pub(crate) engine: SyncEngine<FlakyStore>,
    pub(crate) flag: OnlineFlag,
    pub(crate) clock: Arc<FixedClock>,
    pub(crate) script: Arc<Mutex<Script>>,
    pub(crate) remote_dir: PathBuf,
}

/// 2024-06-10 12:00 UTC.
pub(crate) fn reference_now() -> OffsetDateTime {
    Date::from_calendar_date(2024, Month::June, 10)
        .expect("valid date")
        .with_time(Time::from_hms(12, 0, 0).expect("noon"))
        .assume_utc()
}

pub(crate) fn harness(label: &str, online: bool) -> Harness {
    let root = temp_dir(label);
    let remote_dir = root.join("remote");
    let local = LocalStore::open(root.join("local")).expect("local store opens");
    let inner = SqliteLogStore::open(&remote_dir).expect("remote store opens");
    let script = Arc::new(Mutex::new(Script::default()));
    let flag = OnlineFlag::new(online);
    let clock = Arc::new(FixedClock::new(reference_now()));
    let engine = SyncEngine::new(
        local,
        FlakyStore {
            inner,
            script: Arc::clone(&script),
        },
        Arc::new(flag.clone()),
        clock.clone(),
        SyncConfig::default(),
    );
    Harness {
        engine,
        flag,
        clock,
        script,
        remote_dir,
    }
}

impl Harness {
    pub(crate) fn writes(&self) -> Vec<String> {
        self.script.lock().expect("script lock").writes.clone()
    }

    pub(crate) fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    /// A second connection to the authoritative database, for server-side edits.
    pub(crate) fn server(&self) -> SqliteLogStore {
        SqliteLogStore::open(&self.remote_dir).expect("second remote connection")
    }
}

pub(crate) fn user() -> UserId {
    UserId::try_new("u1").expect("user id")
}

pub(crate) fn habit_id(raw: &str) -> HabitId {
    HabitId::try_new(raw).expect("habit id")
}

pub(crate) fn day(raw: &str) -> LogDate {
    LogDate::parse(raw).expect("date")
}

pub(crate) fn create(raw: &str, name: &str) -> Mutation {
    Mutation::CreateHabit(NewHabit::daily(habit_id(raw), user(), name))
}

pub(crate) fn log(raw: &str, date: &str, completed: bool) -> Mutation {
    Mutation::LogHabit(LogEntry::new(habit_id(raw), day(date), completed))
}
