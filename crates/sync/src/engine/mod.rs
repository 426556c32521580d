#![forbid(unsafe_code)]

mod apply;

use crate::env::{Clock, Connectivity, unix_ms};
use crate::error::SyncError;
use crate::events::{Subscribers, SyncEvent};
use crossbeam::channel::Receiver;
use ritual_core::ids::{HabitId, MutationId, UserId};
use ritual_core::insights::{Insight, generate_insights};
use ritual_core::{
    CompletionLog, DateRange, Habit, LogDate, LogScope, LogStore, Mutation, MutationKind,
    PendingMutation, RemoteError, StatsSnapshot, StreakSummary, aggregate_stats,
    compute_streak_from_logs,
};
use ritual_storage::LocalStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

pub const DEFAULT_STREAK_LOOKBACK_DAYS: u32 = 400;
pub const DEFAULT_MIRROR_WINDOW_DAYS: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Zone every "today" is evaluated in.
    pub zone: UtcOffset,
    /// Days of completed logs read back when recomputing a habit's streak.
    pub streak_lookback_days: u32,
    /// Days of logs pulled into the mirror on refresh and reconcile.
    pub mirror_window_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            zone: UtcOffset::UTC,
            streak_lookback_days: DEFAULT_STREAK_LOOKBACK_DAYS,
            mirror_window_days: DEFAULT_MIRROR_WINDOW_DAYS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DrainStop {
    /// Every mutation in the pass was applied or rejected.
    Drained,
    /// The store was unreachable; `id` and everything after it stay queued.
    Transient { id: MutationId, message: String },
    /// Connectivity dropped between mutations.
    Offline,
    /// Another pass was already running; nothing was attempted.
    AlreadySyncing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub habit_id: HabitId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub applied: Vec<MutationId>,
    pub failed: Vec<RejectedMutation>,
    pub remaining: usize,
    pub stop: DrainStop,
}

/// Queues local intent and reconciles it with the authoritative store.
///
/// At most one drain pass runs at a time; a second trigger while one is in
/// flight returns immediately with [`DrainStop::AlreadySyncing`].
pub struct SyncEngine<S> {
    local: Mutex<LocalStore>,
    remote: Mutex<S>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    syncing: AtomicBool,
    last_online: AtomicBool,
    subscribers: Subscribers,
}

struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: LogStore> SyncEngine<S> {
    pub fn new(
        local: LocalStore,
        remote: S,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let online = connectivity.is_online();
        Self {
            local: Mutex::new(local),
            remote: Mutex::new(remote),
            connectivity,
            clock,
            config,
            syncing: AtomicBool::new(false),
            last_online: AtomicBool::new(online),
            subscribers: Subscribers::default(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.subscribers.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn pending(&self) -> Result<Vec<PendingMutation>, SyncError> {
        Ok(lock(&self.local).list_pending()?)
    }

    pub fn pending_count(&self) -> Result<usize, SyncError> {
        Ok(lock(&self.local).pending_count()?)
    }

    pub fn mirror_habits(&self, user_id: &UserId) -> Result<Vec<Habit>, SyncError> {
        Ok(lock(&self.local).mirror_habits(user_id)?)
    }

    pub fn mirror_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, SyncError> {
        Ok(lock(&self.local).mirror_habit(habit_id)?)
    }

    fn today(&self, now: OffsetDateTime) -> LogDate {
        LogDate::today_in(now, self.config.zone)
    }

    fn mirror_range(&self, now: OffsetDateTime) -> DateRange {
        DateRange::trailing_days(self.today(now), self.config.mirror_window_days)
    }

    fn lookback_range(&self, now: OffsetDateTime) -> DateRange {
        DateRange::trailing_days(self.today(now), self.config.streak_lookback_days)
    }

    /// Validates, records and optimistically applies a mutation. Never touches the network.
    pub fn enqueue_mutation(&self, mutation: Mutation) -> Result<PendingMutation, SyncError> {
        mutation.validate()?;
        let now = self.clock.now();

        let pending = {
            let mut local = lock(&self.local);
            let pending = local.enqueue(&mutation, unix_ms(now))?;
            if pending.kind() == MutationKind::LogHabit {
                self.refresh_mirror_streak(&mut local, pending.habit_id(), now)?;
            }
            pending
        };

        debug!(
            id = %pending.id,
            kind = pending.kind().as_str(),
            habit_id = %pending.habit_id(),
            seq = pending.seq,
            "mutation queued"
        );
        self.subscribers.emit(SyncEvent::MutationQueued {
            id: pending.id.clone(),
            kind: pending.kind(),
            habit_id: pending.habit_id().clone(),
        });
        Ok(pending)
    }

    fn refresh_mirror_streak(
        &self,
        local: &mut LocalStore,
        habit_id: &HabitId,
        now: OffsetDateTime,
    ) -> Result<(), SyncError> {
        let logs = local.mirror_logs(habit_id, self.lookback_range(now))?;
        let summary = compute_streak_from_logs(&logs, now, self.config.zone);
        local.set_mirror_streak(habit_id, summary.current_streak, summary.longest_streak)?;
        Ok(())
    }

    /// Observes connectivity; an offline to online edge starts a drain pass.
    pub fn poll_connectivity(&self) -> Result<Option<DrainReport>, SyncError> {
        let online = self.connectivity.is_online();
        let was_online = self.last_online.swap(online, Ordering::SeqCst);
        if online == was_online {
            return Ok(None);
        }

        info!(online, "connectivity changed");
        self.subscribers
            .emit(SyncEvent::ConnectivityChanged { online });
        if online {
            self.drain_queue().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Applies queued mutations to the store in FIFO order.
    ///
    /// A transient failure stops the pass and leaves the failed mutation and
    /// everything after it queued. A permanent rejection drops that mutation,
    /// reports it in [`DrainReport::failed`] and moves on.
    pub fn drain_queue(&self) -> Result<DrainReport, SyncError> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("drain requested while a pass is running");
            return Ok(DrainReport {
                applied: Vec::new(),
                failed: Vec::new(),
                remaining: lock(&self.local).pending_count()?,
                stop: DrainStop::AlreadySyncing,
            });
        }
        let _guard = SyncingGuard(&self.syncing);

        let queue = lock(&self.local).list_pending()?;
        self.subscribers.emit(SyncEvent::SyncStarted {
            pending: queue.len(),
        });
        info!(pending = queue.len(), "sync pass started");

        let mut applied = Vec::new();
        let mut failed = Vec::new();
        let mut stop = DrainStop::Drained;

        for pending in queue {
            if !self.connectivity.is_online() {
                warn!(id = %pending.id, "went offline during sync pass");
                stop = DrainStop::Offline;
                break;
            }

            let now = self.clock.now();
            let outcome = {
                let mut remote = lock(&self.remote);
                apply::apply_remote(&mut *remote, &pending.mutation, now, &self.config)
            };

            match outcome {
                Ok(()) => {
                    self.confirm(&pending, now)?;
                    debug!(id = %pending.id, kind = pending.kind().as_str(), "mutation applied");
                    self.subscribers.emit(SyncEvent::MutationApplied {
                        id: pending.id.clone(),
                        kind: pending.kind(),
                        habit_id: pending.habit_id().clone(),
                    });
                    applied.push(pending.id);
                }
                Err(RemoteError::Unavailable(message)) => {
                    warn!(id = %pending.id, %message, "store unavailable; sync pass aborted");
                    stop = DrainStop::Transient {
                        id: pending.id,
                        message,
                    };
                    break;
                }
                Err(RemoteError::Rejected(message)) => {
                    warn!(
                        id = %pending.id,
                        kind = pending.kind().as_str(),
                        habit_id = %pending.habit_id(),
                        %message,
                        "mutation rejected; dropping it"
                    );
                    self.confirm(&pending, now)?;
                    self.subscribers.emit(SyncEvent::MutationRejected {
                        id: pending.id.clone(),
                        kind: pending.kind(),
                        habit_id: pending.habit_id().clone(),
                        message: message.clone(),
                    });
                    failed.push(RejectedMutation {
                        id: pending.id,
                        kind: pending.mutation.kind(),
                        habit_id: pending.mutation.habit_id().clone(),
                        message,
                    });
                }
            }
        }

        let remaining = lock(&self.local).pending_count()?;
        info!(
            applied = applied.len(),
            failed = failed.len(),
            remaining,
            "sync pass finished"
        );
        self.subscribers.emit(SyncEvent::SyncFinished {
            applied: applied.len(),
            failed: failed.len(),
            remaining,
        });

        Ok(DrainReport {
            applied,
            failed,
            remaining,
            stop,
        })
    }

    /// Removes a settled mutation and rebases its habit's mirror on the store's view.
    fn confirm(&self, pending: &PendingMutation, now: OffsetDateTime) -> Result<(), SyncError> {
        let habit_id = pending.habit_id();
        let range = self.mirror_range(now);
        let view = {
            let mut remote = lock(&self.remote);
            match remote.find_habit(habit_id) {
                Ok(habit) => remote.list_logs(habit_id, range).map(|logs| (habit, logs)),
                Err(err) => Err(err),
            }
        };

        let mut local = lock(&self.local);
        local.remove(&pending.id)?;
        match view {
            Ok((habit, logs)) => {
                local.reconcile_habit(habit_id, habit.as_ref(), &logs, range)?;
                if local.has_pending_for_habit(habit_id)? {
                    self.refresh_mirror_streak(&mut local, habit_id, now)?;
                }
            }
            Err(err) => {
                warn!(%habit_id, error = %err, "could not read back habit; mirror left as is");
            }
        }
        Ok(())
    }

    /// Replaces the user's mirror with the store's habits and recent logs, then replays pending intent.
    pub fn refresh_mirror(&self, user_id: &UserId) -> Result<usize, SyncError> {
        if !self.connectivity.is_online() {
            return Err(SyncError::TransientSync("offline".to_string()));
        }
        let range = self.mirror_range(self.clock.now());
        let (habits, logs) = {
            let mut remote = lock(&self.remote);
            let habits = remote.find_habits(user_id)?;
            let mut logs = Vec::new();
            for habit in &habits {
                logs.extend(remote.list_logs(&habit.id, range)?);
            }
            (habits, logs)
        };

        lock(&self.local).rebase_mirror(user_id, &habits, &logs, range)?;
        info!(%user_id, habits = habits.len(), logs = logs.len(), "mirror refreshed");
        self.subscribers.emit(SyncEvent::MirrorRefreshed {
            user_id: user_id.clone(),
            habits: habits.len(),
        });
        Ok(habits.len())
    }

    /// Fresh streak for one habit, read from the store when online and from the mirror otherwise.
    pub fn habit_streak(&self, habit_id: &HabitId) -> Result<StreakSummary, SyncError> {
        let now = self.clock.now();
        let range = self.lookback_range(now);
        let scope = LogScope::Habit(habit_id.clone());
        let logs = if self.connectivity.is_online() {
            lock(&self.remote).list_completed_logs(&scope, range)?
        } else {
            lock(&self.local).mirror_completed_logs(&scope, range)?
        };
        Ok(compute_streak_from_logs(&logs, now, self.config.zone))
    }

    /// Yearly statistics and archetype for `user_id`; streaks may reach back past 1 January.
    pub fn stats(&self, user_id: &UserId) -> Result<StatsSnapshot, SyncError> {
        let now = self.clock.now();
        let range = DateRange::calendar_year(self.today(now)).span(self.lookback_range(now));
        let (habits, logs) = self.user_view(user_id, range, true)?;
        Ok(aggregate_stats(&habits, &logs, now, self.config.zone))
    }

    /// Candidate insights for the user's active habits, judged on recent logs.
    pub fn insights(&self, user_id: &UserId) -> Result<Vec<Insight>, SyncError> {
        let range = self.mirror_range(self.clock.now());
        let (habits, logs) = self.user_view(user_id, range, false)?;
        Ok(generate_insights(&habits, &logs))
    }

    fn user_view(
        &self,
        user_id: &UserId,
        range: DateRange,
        completed_only: bool,
    ) -> Result<(Vec<Habit>, Vec<CompletionLog>), SyncError> {
        let scope = LogScope::User(user_id.clone());
        if self.connectivity.is_online() {
            let mut remote = lock(&self.remote);
            let habits = remote.find_habits(user_id)?;
            let logs = if completed_only {
                remote.list_completed_logs(&scope, range)?
            } else {
                let mut logs = Vec::new();
                for habit in &habits {
                    logs.extend(remote.list_logs(&habit.id, range)?);
                }
                logs
            };
            Ok((habits, logs))
        } else {
            debug!(%user_id, "offline; reading from the mirror");
            let local = lock(&self.local);
            let habits = local.mirror_habits(user_id)?;
            let logs = if completed_only {
                local.mirror_completed_logs(&scope, range)?
            } else {
                let mut logs = Vec::new();
                for habit in &habits {
                    logs.extend(local.mirror_logs(&habit.id, range)?);
                }
                logs
            };
            Ok((habits, logs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syncing_guard_resets_on_drop() {
        let flag = AtomicBool::new(true);
        {
            let _guard = SyncingGuard(&flag);
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn default_config_matches_documented_windows() {
        let config = SyncConfig::default();
        assert_eq!(config.zone, UtcOffset::UTC);
        assert_eq!(config.streak_lookback_days, 400);
        assert_eq!(config.mirror_window_days, 30);
    }
}
