#![forbid(unsafe_code)]

use crate::StoreError;
use crate::rows;
use ritual_core::Mutation;
use rusqlite::Connection;

/// Optimistically applies one mutation to the mirror tables.
///
/// Replays are safe: creating a habit that is already mirrored keeps the
/// mirrored row, and patches against a habit the mirror does not know are skipped.
pub(super) fn apply(conn: &Connection, mutation: &Mutation, at_ms: i64) -> Result<(), StoreError> {
    match mutation {
        Mutation::CreateHabit(new_habit) => {
            rows::insert_habit_if_absent(conn, &new_habit.clone().into_habit(at_ms))?;
        }
        Mutation::UpdateHabit(patch) => {
            if let Some(mut habit) = rows::load_habit(conn, &patch.habit_id)? {
                patch.apply_to(&mut habit);
                rows::put_habit(conn, &habit)?;
            }
        }
        Mutation::DeleteHabit { habit_id } => {
            rows::delete_habit_rows(conn, habit_id)?;
        }
        Mutation::LogHabit(entry) => {
            rows::upsert_log(conn, entry, at_ms)?;
        }
    }
    Ok(())
}
