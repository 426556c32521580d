#![forbid(unsafe_code)]

use super::SyncConfig;
use ritual_core::ids::HabitId;
use ritual_core::{
    DateRange, LogDate, LogScope, LogStore, Mutation, RemoteError, StreakSummary,
    compute_streak_from_logs,
};
use time::OffsetDateTime;
use tracing::debug;

/// Sends one mutation to the store. Logging a completion also recomputes the habit's streak.
pub(super) fn apply_remote<S: LogStore + ?Sized>(
    remote: &mut S,
    mutation: &Mutation,
    now: OffsetDateTime,
    config: &SyncConfig,
) -> Result<(), RemoteError> {
    match mutation {
        Mutation::CreateHabit(new_habit) => {
            remote.create_habit(new_habit)?;
        }
        Mutation::UpdateHabit(patch) => {
            remote.update_habit(patch)?;
        }
        Mutation::DeleteHabit { habit_id } => {
            remote.delete_habit(habit_id)?;
        }
        Mutation::LogHabit(entry) => {
            remote.upsert_log(entry)?;
            let summary = recompute_streak(remote, &entry.habit_id, now, config)?;
            debug!(
                habit_id = %entry.habit_id,
                current = summary.current_streak,
                longest = summary.longest_streak,
                "streak recomputed"
            );
        }
    }
    Ok(())
}

fn recompute_streak<S: LogStore + ?Sized>(
    remote: &mut S,
    habit_id: &HabitId,
    now: OffsetDateTime,
    config: &SyncConfig,
) -> Result<StreakSummary, RemoteError> {
    let today = LogDate::today_in(now, config.zone);
    let range = DateRange::trailing_days(today, config.streak_lookback_days);
    let logs = remote.list_completed_logs(&LogScope::Habit(habit_id.clone()), range)?;
    let summary = compute_streak_from_logs(&logs, now, config.zone);
    remote.update_habit_streak(habit_id, summary.current_streak, summary.longest_streak)?;
    Ok(summary)
}
