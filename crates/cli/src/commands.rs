#![forbid(unsafe_code)]

use crate::config::{AddArgs, CliConfig, Command};
use ritual_core::ids::HabitId;
use ritual_core::insights::pick_insight;
use ritual_core::{HabitPatch, LogDate, LogEntry, LogStore, Mutation, NewHabit};
use ritual_sync::{SyncEngine, SyncError};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::info;

pub(crate) fn run<S: LogStore>(engine: &SyncEngine<S>, cfg: &CliConfig) -> Result<Value, SyncError> {
    match &cfg.command {
        Command::Add(add) => {
            let habit_id = HabitId::generate();
            let mutation = Mutation::CreateHabit(new_habit(cfg, habit_id.clone(), add));
            let mut out = write(engine, mutation)?;
            out["habit_id"] = json!(habit_id);
            Ok(out)
        }
        Command::Log {
            habit_id,
            date,
            completed,
            value,
        } => {
            let date = date
                .unwrap_or_else(|| LogDate::today_in(OffsetDateTime::now_utc(), cfg.zone));
            let mut entry = LogEntry::new(habit_id.clone(), date, *completed);
            entry.value = *value;
            write(engine, Mutation::LogHabit(entry))
        }
        Command::Archive { habit_id, restore } => {
            let mut patch = HabitPatch::for_habit(habit_id.clone());
            patch.archived = Some(!restore);
            write(engine, Mutation::UpdateHabit(patch))
        }
        Command::Delete { habit_id } => write(
            engine,
            Mutation::DeleteHabit {
                habit_id: habit_id.clone(),
            },
        ),
        Command::Sync => {
            let report = engine.drain_queue()?;
            Ok(json!({ "sync": report, "state": engine.state() }))
        }
        Command::Pending => {
            let pending = engine.pending()?;
            Ok(json!({ "count": pending.len(), "pending": pending }))
        }
        Command::Habits { all } => {
            let habits = engine
                .mirror_habits(&cfg.user)?
                .into_iter()
                .filter(|habit| *all || !habit.archived)
                .collect::<Vec<_>>();
            Ok(json!({ "habits": habits }))
        }
        Command::Streak { habit_id } => {
            let streak = engine.habit_streak(habit_id)?;
            Ok(json!({ "habit_id": habit_id, "streak": streak }))
        }
        Command::Stats => Ok(json!({ "stats": engine.stats(&cfg.user)? })),
        Command::Insights { recent } => {
            let candidates = engine.insights(&cfg.user)?;
            let picked = pick_insight(&candidates, recent.as_slice()).cloned();
            Ok(json!({ "picked": picked, "candidates": candidates }))
        }
        Command::Refresh => {
            let habits = engine.refresh_mirror(&cfg.user)?;
            Ok(json!({ "habits": habits }))
        }
    }
}

fn new_habit(cfg: &CliConfig, id: HabitId, add: &AddArgs) -> NewHabit {
    NewHabit {
        id,
        user_id: cfg.user.clone(),
        name: add.name.clone(),
        color: add.color.clone(),
        category: add.category.clone(),
        icon: add.icon.clone(),
        cadence: add.cadence,
        goal_kind: add.goal_kind,
        target_value: add.target_value,
        reminder_time: add.reminder_time.clone(),
    }
}

/// Queues a mutation and, when online, drains the queue in the same invocation.
fn write<S: LogStore>(engine: &SyncEngine<S>, mutation: Mutation) -> Result<Value, SyncError> {
    let queued = engine.enqueue_mutation(mutation)?;
    info!(id = %queued.id, kind = queued.kind().as_str(), "mutation queued");
    let report = if engine.is_online() {
        Some(engine.drain_queue()?)
    } else {
        None
    };
    Ok(json!({
        "queued": queued,
        "pending": engine.pending_count()?,
        "sync": report,
    }))
}
