#![forbid(unsafe_code)]

use crate::ids::{HabitId, UserId};
use crate::model::{CompletionLog, DateRange, Habit, HabitPatch, LogEntry, LogScope, NewHabit};

/// Failure reported by the authoritative store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or store temporarily unreachable; the same call may succeed later.
    Unavailable(String),
    /// The store refused the operation and will keep refusing it.
    Rejected(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote unavailable: {message}"),
            Self::Rejected(message) => write!(f, "remote rejected: {message}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// The authoritative source of truth for habits and completion logs.
///
/// Every write is keyed by natural identity (habit id, or habit id + date), so
/// re-sending an operation after an ambiguous failure leaves the same final state.
pub trait LogStore {
    fn find_habits(&mut self, user_id: &UserId) -> Result<Vec<Habit>, RemoteError>;

    fn find_habit(&mut self, habit_id: &HabitId) -> Result<Option<Habit>, RemoteError>;

    /// Creates the habit, or returns the existing one when the id is already known.
    fn create_habit(&mut self, habit: &NewHabit) -> Result<Habit, RemoteError>;

    fn update_habit(&mut self, patch: &HabitPatch) -> Result<Habit, RemoteError>;

    /// Removes the habit and its logs. Deleting an unknown habit succeeds.
    fn delete_habit(&mut self, habit_id: &HabitId) -> Result<(), RemoteError>;

    fn upsert_log(&mut self, entry: &LogEntry) -> Result<CompletionLog, RemoteError>;

    /// Completed logs only, ordered by date descending.
    fn list_completed_logs(
        &mut self,
        scope: &LogScope,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError>;

    /// All logs (completed or not) for one habit in `range`, ordered by date descending.
    fn list_logs(
        &mut self,
        habit_id: &HabitId,
        range: DateRange,
    ) -> Result<Vec<CompletionLog>, RemoteError>;

    fn update_habit_streak(
        &mut self,
        habit_id: &HabitId,
        current_streak: u32,
        longest_streak: u32,
    ) -> Result<Habit, RemoteError>;
}
