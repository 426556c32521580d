#![forbid(unsafe_code)]

//! Habit and log tables shared by the local mirror and the authoritative store.

use crate::StoreError;
use ritual_core::ids::{HabitId, UserId};
use ritual_core::{Cadence, CompletionLog, DateRange, GoalKind, Habit, LogDate, LogEntry, LogScope};
use rusqlite::{Connection, OptionalExtension, params};

pub(crate) const SCHEMA_VERSION: &str = "1";

pub(crate) const HABIT_LOG_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS habits (
      id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      name TEXT NOT NULL,
      color TEXT NOT NULL,
      category TEXT,
      icon TEXT,
      cadence TEXT NOT NULL,
      goal_kind TEXT NOT NULL,
      target_value REAL NOT NULL,
      reminder_time TEXT,
      current_streak INTEGER NOT NULL DEFAULT 0,
      longest_streak INTEGER NOT NULL DEFAULT 0,
      archived INTEGER NOT NULL DEFAULT 0,
      created_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS logs (
      habit_id TEXT NOT NULL,
      date TEXT NOT NULL,
      completed INTEGER NOT NULL,
      value REAL NOT NULL,
      created_at_ms INTEGER NOT NULL,
      updated_at_ms INTEGER NOT NULL,
      PRIMARY KEY (habit_id, date)
    );

    CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id, created_at_ms);
    CREATE INDEX IF NOT EXISTS idx_logs_date ON logs(date);
"#;

/// Installs tables and stamps the schema version, refusing databases written by another version.
pub(crate) fn migrate(conn: &Connection, extra_schema: &str) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )?;
    conn.execute_batch(HABIT_LOG_SCHEMA)?;
    conn.execute_batch(extra_schema)?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;

    let version = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match version.as_deref() {
        Some(SCHEMA_VERSION) => Ok(()),
        _ => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
    }
}

const HABIT_COLUMNS: &str = "id, user_id, name, color, category, icon, cadence, goal_kind, \
     target_value, reminder_time, current_streak, longest_streak, archived, created_at_ms";

fn habit_from_row(row: &rusqlite::Row<'_>) -> Result<Habit, StoreError> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let cadence: String = row.get(6)?;
    let goal_kind: String = row.get(7)?;

    Ok(Habit {
        id: HabitId::try_new(id.clone())
            .map_err(|err| StoreError::Corrupt(format!("habit id {id:?}: {err}")))?,
        user_id: UserId::try_new(user_id)
            .map_err(|err| StoreError::Corrupt(format!("habit {id}: user id: {err}")))?,
        name: row.get(2)?,
        color: row.get(3)?,
        category: row.get(4)?,
        icon: row.get(5)?,
        cadence: Cadence::parse(&cadence)
            .ok_or_else(|| StoreError::Corrupt(format!("habit {id}: cadence {cadence:?}")))?,
        goal_kind: GoalKind::parse(&goal_kind)
            .ok_or_else(|| StoreError::Corrupt(format!("habit {id}: goal kind {goal_kind:?}")))?,
        target_value: row.get(8)?,
        reminder_time: row.get(9)?,
        current_streak: row.get(10)?,
        longest_streak: row.get(11)?,
        archived: row.get::<_, i64>(12)? != 0,
        created_at_ms: row.get(13)?,
    })
}

fn log_from_row(row: &rusqlite::Row<'_>) -> Result<CompletionLog, StoreError> {
    let habit_id: String = row.get(0)?;
    let date: String = row.get(1)?;
    Ok(CompletionLog {
        habit_id: HabitId::try_new(habit_id.clone())
            .map_err(|err| StoreError::Corrupt(format!("log habit id {habit_id:?}: {err}")))?,
        date: LogDate::parse(&date)
            .map_err(|err| StoreError::Corrupt(format!("log {habit_id}/{date}: {err}")))?,
        completed: row.get::<_, i64>(2)? != 0,
        value: row.get(3)?,
        created_at_ms: row.get(4)?,
        updated_at_ms: row.get(5)?,
    })
}

pub(crate) fn load_habit(conn: &Connection, habit_id: &HabitId) -> Result<Option<Habit>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id=?1"))?;
    let mut rows = stmt.query(params![habit_id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(habit_from_row(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn load_user_habits(conn: &Connection, user_id: &UserId) -> Result<Vec<Habit>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id=?1 ORDER BY created_at_ms ASC, id ASC"
    ))?;
    let mut rows = stmt.query(params![user_id.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(habit_from_row(row)?);
    }
    Ok(out)
}

/// Inserts or fully overwrites a habit row.
pub(crate) fn put_habit(conn: &Connection, habit: &Habit) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO habits(id, user_id, name, color, category, icon, cadence, goal_kind,
                           target_value, reminder_time, current_streak, longest_streak, archived, created_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
          user_id=excluded.user_id,
          name=excluded.name,
          color=excluded.color,
          category=excluded.category,
          icon=excluded.icon,
          cadence=excluded.cadence,
          goal_kind=excluded.goal_kind,
          target_value=excluded.target_value,
          reminder_time=excluded.reminder_time,
          current_streak=excluded.current_streak,
          longest_streak=excluded.longest_streak,
          archived=excluded.archived,
          created_at_ms=excluded.created_at_ms
        "#,
        params![
            habit.id.as_str(),
            habit.user_id.as_str(),
            habit.name,
            habit.color,
            habit.category,
            habit.icon,
            habit.cadence.as_str(),
            habit.goal_kind.as_str(),
            habit.target_value,
            habit.reminder_time,
            habit.current_streak,
            habit.longest_streak,
            i64::from(habit.archived),
            habit.created_at_ms,
        ],
    )?;
    Ok(())
}

/// Inserts the habit unless its id already exists; returns whether a row was written.
pub(crate) fn insert_habit_if_absent(conn: &Connection, habit: &Habit) -> Result<bool, StoreError> {
    if load_habit(conn, &habit.id)?.is_some() {
        return Ok(false);
    }
    put_habit(conn, habit)?;
    Ok(true)
}

pub(crate) fn delete_habit_rows(conn: &Connection, habit_id: &HabitId) -> Result<bool, StoreError> {
    conn.execute("DELETE FROM logs WHERE habit_id=?1", params![habit_id.as_str()])?;
    let removed = conn.execute("DELETE FROM habits WHERE id=?1", params![habit_id.as_str()])?;
    Ok(removed > 0)
}

pub(crate) fn set_streak(
    conn: &Connection,
    habit_id: &HabitId,
    current_streak: u32,
    longest_streak: u32,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE habits SET current_streak=?2, longest_streak=?3 WHERE id=?1",
        params![habit_id.as_str(), current_streak, longest_streak],
    )?;
    Ok(changed > 0)
}

/// Creates or updates the (habit, date) log; timestamps come from `now_ms`.
pub(crate) fn upsert_log(
    conn: &Connection,
    entry: &LogEntry,
    now_ms: i64,
) -> Result<CompletionLog, StoreError> {
    let date = entry.date.to_string();
    conn.execute(
        r#"
        INSERT INTO logs(habit_id, date, completed, value, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT(habit_id, date) DO UPDATE SET
          completed=excluded.completed,
          value=excluded.value,
          updated_at_ms=excluded.updated_at_ms
        "#,
        params![
            entry.habit_id.as_str(),
            date,
            i64::from(entry.completed),
            entry.resolved_value(),
            now_ms,
        ],
    )?;

    let mut stmt = conn.prepare(
        "SELECT habit_id, date, completed, value, created_at_ms, updated_at_ms \
         FROM logs WHERE habit_id=?1 AND date=?2",
    )?;
    let mut rows = stmt.query(params![entry.habit_id.as_str(), date])?;
    match rows.next()? {
        Some(row) => log_from_row(row),
        None => Err(StoreError::UnknownId),
    }
}

/// Writes a log exactly as given, timestamps included.
pub(crate) fn put_log(conn: &Connection, log: &CompletionLog) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO logs(habit_id, date, completed, value, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(habit_id, date) DO UPDATE SET
          completed=excluded.completed,
          value=excluded.value,
          created_at_ms=excluded.created_at_ms,
          updated_at_ms=excluded.updated_at_ms
        "#,
        params![
            log.habit_id.as_str(),
            log.date.to_string(),
            i64::from(log.completed),
            log.value,
            log.created_at_ms,
            log.updated_at_ms,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_logs_in_range(
    conn: &Connection,
    habit_id: &HabitId,
    range: DateRange,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM logs WHERE habit_id=?1 AND date>=?2 AND date<=?3",
        params![habit_id.as_str(), range.start.to_string(), range.end.to_string()],
    )?)
}

/// Logs for `scope` dated within `range`, newest first.
pub(crate) fn query_logs(
    conn: &Connection,
    scope: &LogScope,
    range: DateRange,
    completed_only: bool,
) -> Result<Vec<CompletionLog>, StoreError> {
    let (filter, key) = match scope {
        LogScope::Habit(habit_id) => ("l.habit_id=?1", habit_id.as_str()),
        LogScope::User(user_id) => (
            "l.habit_id IN (SELECT id FROM habits WHERE user_id=?1)",
            user_id.as_str(),
        ),
    };
    let completed = if completed_only { " AND l.completed=1" } else { "" };
    let sql = format!(
        "SELECT l.habit_id, l.date, l.completed, l.value, l.created_at_ms, l.updated_at_ms \
         FROM logs l \
         WHERE {filter} AND l.date>=?2 AND l.date<=?3{completed} \
         ORDER BY l.date DESC, l.habit_id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![key, range.start.to_string(), range.end.to_string()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(log_from_row(row)?);
    }
    Ok(out)
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
