#![forbid(unsafe_code)]

use crate::StoreError;
use crate::rows;
use ritual_core::ids::{HabitId, UserId};
use ritual_core::{
    CompletionLog, DateRange, Habit, HabitPatch, LogEntry, LogScope, LogStore, NewHabit,
    RemoteError,
};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const REMOTE_DB_FILE: &str = "ritual_remote.db";

/// Authoritative habit and log store backed by its own SQLite database.
#[derive(Debug)]
pub struct SqliteLogStore {
    conn: Connection,
    clock: fn() -> i64,
}

impl SqliteLogStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref();
        std::fs::create_dir_all(storage_dir)?;
        let conn = Connection::open(storage_dir.join(REMOTE_DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        rows::migrate(&conn, "")?;
        Ok(Self {
            conn,
            clock: rows::now_ms,
        })
    }

    /// Replaces the source of `created_at_ms`/`updated_at_ms` stamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    fn require_habit(&self, habit_id: &HabitId) -> Result<Habit, RemoteError> {
        rows::load_habit(&self.conn, habit_id)
            .map_err(to_remote)?
            .ok_or_else(|| RemoteError::Rejected(format!("unknown habit {habit_id}")))
    }
}

impl LogStore for SqliteLogStore {
    fn find_habits(&mut self, user_id: &UserId) -> Result<Vec<Habit>, RemoteError> {
        rows::load_user_habits(&self.conn, user_id).map_err(to_remote)
    }

    fn find_habit(&mut self, habit_id: &HabitId) -> Result<Option<Habit>, RemoteError> {
        rows::load_habit(&self.conn, habit_id).map_err(to_remote)
    }

    fn create_habit(&mut self, habit: &NewHabit) -> Result<Habit, RemoteError> {
        if let Some(existing) = rows::load_habit(&self.conn, &habit.id).map_err(to_remote)? {
            if existing.user_id != habit.user_id {
                return Err(RemoteError::Rejected(format!(
                    "habit {} belongs to another user",
                    habit.id
                )));
            }
            debug!(habit_id = %habit.id, "create_habit: already present");
            return Ok(existing);
        }
        let created = habit.clone().into_habit((self.clock)());
        rows::put_habit(&self.conn, &created).map_err(to_remote)?;
        Ok(created)
    }

    fn update_habit(&mut self, patch: &HabitPatch) -> Result<Habit, RemoteError> {
        let mut habit = self.require_habit(&patch.habit_id)?;
        patch.apply_to(&mut habit);
        rows::put_habit(&self.conn, &habit).map_err(to_remote)?;
        Ok(habit)
    }

    fn delete_habit(&mut self, habit_id: &HabitId) -> Result<(), RemoteError> {
        let tx = self.conn.transaction().map_err(|err| to_remote(err.into()))?;
        let removed = rows::delete_habit_rows(&tx, habit_id).map_err(to_remote)?;
        tx.commit().map_err(|err| to_remote(err.into()))?;
        if !removed {
            debug!(%habit_id, "delete_habit: nothing to delete");
        }
        Ok(())
    }

    fn upsert_log(&mut self, entry: &LogEntry) -> Result<CompletionLog, RemoteError> {
        self.require_habit(&entry.habit_id)?;
        rows::upsert_log(&self.conn, entry, (self.clock)()).map_err(to_remote)
    }

    fn list_completed_logs(
        &mut self,
        scope: &LogScope,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError> {
        rows::query_logs(&self.conn, scope, range, true).map_err(to_remote)
    }

    fn list_logs(
        &mut self,
        habit_id: &HabitId,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError> {
        rows::query_logs(&self.conn, &LogScope::Habit(habit_id.clone()), range, false)
            .map_err(to_remote)
    }

    fn update_habit_streak(
        &mut self,
        habit_id: &HabitId,
        current_streak: u32,
        longest_streak: u32,
    ) -> Result<Habit, RemoteError> {
        let changed =
            rows::set_streak(&self.conn, habit_id, current_streak, longest_streak).map_err(to_remote)?;
        if !changed {
            return Err(RemoteError::Rejected(format!("unknown habit {habit_id}")));
        }
        self.require_habit(habit_id)
    }
}

fn to_remote(err: StoreError) -> RemoteError {
    if err.is_transient() {
        RemoteError::Unavailable(err.to_string())
    } else {
        RemoteError::Rejected(err.to_string())
    }
}
