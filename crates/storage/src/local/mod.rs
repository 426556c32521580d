#![forbid(unsafe_code)]

mod mirror;

use crate::StoreError;
use crate::rows;
use ritual_core::ids::{HabitId, MutationId, UserId};
use ritual_core::{CompletionLog, DateRange, Habit, LogScope, Mutation, PendingMutation};
use rusqlite::{Connection, params};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const LOCAL_DB_FILE: &str = "ritual_local.db";

const QUEUE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS mutations (
      seq INTEGER PRIMARY KEY AUTOINCREMENT,
      id TEXT NOT NULL UNIQUE,
      kind TEXT NOT NULL,
      habit_id TEXT NOT NULL,
      payload_json TEXT NOT NULL,
      enqueued_at_ms INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_mutations_habit ON mutations(habit_id, seq);
"#;

/// Durable FIFO of pending mutations plus the mirror of habits and logs shown to the user.
///
/// Every enqueue updates the mirror and the queue in one transaction, so the
/// mirror never shows an intent that was not recorded for sync.
#[derive(Debug)]
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref();
        std::fs::create_dir_all(storage_dir)?;
        let conn = Connection::open(storage_dir.join(LOCAL_DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        rows::migrate(&conn, QUEUE_SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn enqueue(
        &mut self,
        mutation: &Mutation,
        enqueued_at_ms: i64,
    ) -> Result<PendingMutation, StoreError> {
        let id = MutationId::generate();
        let payload_json = serde_json::to_string(mutation)?;

        let tx = self.conn.transaction()?;
        mirror::apply(&tx, mutation, enqueued_at_ms)?;
        tx.execute(
            r#"
            INSERT INTO mutations(id, kind, habit_id, payload_json, enqueued_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id.as_str(),
                mutation.kind().as_str(),
                mutation.habit_id().as_str(),
                payload_json,
                enqueued_at_ms,
            ],
        )?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;

        Ok(PendingMutation {
            id,
            seq,
            mutation: mutation.clone(),
            enqueued_at_ms,
        })
    }

    /// Queued mutations in enqueue order.
    pub fn list_pending(&self) -> Result<Vec<PendingMutation>, StoreError> {
        pending_where(&self.conn, None)
    }

    /// Returns `false` when no mutation with `id` is queued.
    pub fn remove(&mut self, id: &MutationId) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM mutations WHERE id=?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(1) FROM mutations", [], |row| row.get::<_, i64>(0))?;
        usize::try_from(count).map_err(|_| StoreError::InvalidInput("numeric overflow"))
    }

    pub fn has_pending_for_habit(&self, habit_id: &HabitId) -> Result<bool, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(1) FROM mutations WHERE habit_id=?1",
            params![habit_id.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count > 0)
    }

    pub fn mirror_habits(&self, user_id: &UserId) -> Result<Vec<Habit>, StoreError> {
        rows::load_user_habits(&self.conn, user_id)
    }

    pub fn mirror_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, StoreError> {
        rows::load_habit(&self.conn, habit_id)
    }

    /// All mirrored logs (completed or not) for one habit, newest first.
    pub fn mirror_logs(
        &self,
        habit_id: &HabitId,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        rows::query_logs(&self.conn, &LogScope::Habit(habit_id.clone()), range, false)
    }

    pub fn mirror_completed_logs(
        &self,
        scope: &LogScope,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        rows::query_logs(&self.conn, scope, range, true)
    }

    pub fn set_mirror_streak(
        &mut self,
        habit_id: &HabitId,
        current_streak: u32,
        longest_streak: u32,
    ) -> Result<bool, StoreError> {
        rows::set_streak(&self.conn, habit_id, current_streak, longest_streak)
    }

    /// Overwrites one habit's mirror with authoritative data, then replays its pending mutations.
    ///
    /// `logs` must cover `range`; mirrored logs outside `range` are left as they are.
    /// `None` for `habit` means the store no longer knows the habit.
    pub fn reconcile_habit(
        &mut self,
        habit_id: &HabitId,
        habit: Option<&Habit>,
        logs: &[CompletionLog],
        range: DateRange,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        match habit {
            Some(habit) => {
                rows::put_habit(&tx, habit)?;
                rows::delete_logs_in_range(&tx, habit_id, range)?;
            }
            None => {
                debug!(%habit_id, "habit gone from the store; dropping its mirror");
                rows::delete_habit_rows(&tx, habit_id)?;
            }
        }
        for log in logs.iter().filter(|log| &log.habit_id == habit_id) {
            rows::put_log(&tx, log)?;
        }
        for pending in pending_where(&tx, Some(habit_id))? {
            mirror::apply(&tx, &pending.mutation, pending.enqueued_at_ms)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Full refresh of a user's mirror: authoritative habits and their logs in
    /// `range`, with every pending mutation replayed on top.
    pub fn rebase_mirror(
        &mut self,
        user_id: &UserId,
        habits: &[Habit],
        logs: &[CompletionLog],
        range: DateRange,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for existing in rows::load_user_habits(&tx, user_id)? {
            if habits.iter().any(|habit| habit.id == existing.id) {
                rows::delete_logs_in_range(&tx, &existing.id, range)?;
            } else {
                rows::delete_habit_rows(&tx, &existing.id)?;
            }
        }
        for habit in habits {
            rows::put_habit(&tx, habit)?;
        }
        for log in logs {
            rows::put_log(&tx, log)?;
        }
        let pending = pending_where(&tx, None)?;
        for mutation in &pending {
            mirror::apply(&tx, &mutation.mutation, mutation.enqueued_at_ms)?;
        }
        tx.commit()?;
        debug!(%user_id, habits = habits.len(), replayed = pending.len(), "mirror rebased");
        Ok(())
    }
}

fn pending_where(
    conn: &Connection,
    habit_id: Option<&HabitId>,
) -> Result<Vec<PendingMutation>, StoreError> {
    let sql = match habit_id {
        Some(_) => {
            "SELECT seq, id, payload_json, enqueued_at_ms FROM mutations \
             WHERE habit_id=?1 ORDER BY seq ASC"
        }
        None => "SELECT seq, id, payload_json, enqueued_at_ms FROM mutations ORDER BY seq ASC",
    };
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match habit_id {
        Some(habit_id) => stmt.query(params![habit_id.as_str()])?,
        None => stmt.query([])?,
    };

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let seq: i64 = row.get(0)?;
        let id: String = row.get(1)?;
        let payload: String = row.get(2)?;
        let enqueued_at_ms: i64 = row.get(3)?;

        let mutation = serde_json::from_str::<Mutation>(&payload)
            .map_err(|err| StoreError::Corrupt(format!("mutation seq={seq}: {err}")))?;
        let id = MutationId::try_new(id)
            .map_err(|err| StoreError::Corrupt(format!("mutation seq={seq}: id: {err}")))?;
        out.push(PendingMutation {
            id,
            seq,
            mutation,
            enqueued_at_ms,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_schema_is_versioned_with_the_habit_tables() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        rows::migrate(&conn, QUEUE_SCHEMA).expect("schema installs");
        rows::migrate(&conn, QUEUE_SCHEMA).expect("schema install is repeatable");

        conn.execute(
            "UPDATE meta SET value='0' WHERE key='schema_version'",
            [],
        )
        .expect("stamp old version");
        let err = rows::migrate(&conn, QUEUE_SCHEMA).expect_err("old version is refused");
        assert_eq!(err.code(), "RESET_REQUIRED");
    }
}
