#![forbid(unsafe_code)]

//! Yearly discipline statistics for one user.

use crate::archetype::{
    Archetype, ArchetypeProfile, ArchetypeStats, EARLY_BEFORE_HOUR, LATE_AFTER_HOUR,
    classify_archetype,
};
use crate::ids::HabitId;
use crate::model::{CompletionLog, DateRange, Habit, LogDate};
use crate::streak::{daily_counts, streak_as_of};
use serde::Serialize;
use std::collections::BTreeMap;
use time::{OffsetDateTime, UtcOffset};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HabitBreakdown {
    pub habit_id: HabitId,
    pub name: String,
    pub color: String,
    pub archived: bool,
    pub total_logs: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub heatmap: BTreeMap<LogDate, u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub year: i32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_habits: u32,
    pub total_logs: u32,
    pub active_days: u32,
    pub early_fraction: f64,
    pub late_fraction: f64,
    pub heatmap: BTreeMap<LogDate, u32>,
    pub habits: Vec<HabitBreakdown>,
    pub archetype: Archetype,
    pub profile: &'static ArchetypeProfile,
}

/// Builds the snapshot from a user's habits and logs.
///
/// Counts, heatmaps and early/late fractions cover completed logs dated within
/// the calendar year of `now` (in `zone`). Streaks run over every completed log
/// passed in, so callers should include the streak lookback window as well.
pub fn aggregate_stats(
    habits: &[Habit],
    logs: &[CompletionLog],
    now: OffsetDateTime,
    zone: UtcOffset,
) -> StatsSnapshot {
    let today = LogDate::today_in(now, zone);
    let year = DateRange::calendar_year(today);
    let completed = logs
        .iter()
        .filter(|log| log.completed)
        .cloned()
        .collect::<Vec<_>>();
    let counted = completed
        .iter()
        .filter(|log| year.contains(log.date))
        .cloned()
        .collect::<Vec<_>>();

    let heatmap = daily_counts(&counted);
    let total_logs = counted.len() as u32;
    let active_days = heatmap.len() as u32;

    let mut early = 0u32;
    let mut late = 0u32;
    for log in &counted {
        let Some(hour) = local_hour(log.created_at_ms, zone) else {
            continue;
        };
        if hour < EARLY_BEFORE_HOUR {
            early += 1;
        }
        if hour > LATE_AFTER_HOUR {
            late += 1;
        }
    }

    let breakdowns = habits
        .iter()
        .map(|habit| breakdown(habit, &counted, &completed, today))
        .collect::<Vec<_>>();

    let active = breakdowns.iter().filter(|b| !b.archived);
    let current_streak = active.clone().map(|b| b.current_streak).max().unwrap_or(0);
    let longest_streak = active.clone().map(|b| b.longest_streak).max().unwrap_or(0);
    let total_habits = active.count() as u32;

    let archetype_stats = ArchetypeStats {
        total_logs,
        active_days,
        current_streak,
        longest_streak,
        early_fraction: fraction(early, total_logs),
        late_fraction: fraction(late, total_logs),
    };
    let archetype = classify_archetype(&archetype_stats);

    StatsSnapshot {
        year: today.year(),
        current_streak,
        longest_streak,
        total_habits,
        total_logs,
        active_days,
        early_fraction: archetype_stats.early_fraction,
        late_fraction: archetype_stats.late_fraction,
        heatmap,
        habits: breakdowns,
        archetype,
        profile: archetype.profile(),
    }
}

fn breakdown(
    habit: &Habit,
    counted: &[CompletionLog],
    completed: &[CompletionLog],
    today: LogDate,
) -> HabitBreakdown {
    let own = counted
        .iter()
        .filter(|log| log.habit_id == habit.id)
        .cloned()
        .collect::<Vec<_>>();
    let heatmap = daily_counts(&own);
    let streak = streak_as_of(
        completed
            .iter()
            .filter(|log| log.habit_id == habit.id)
            .map(|log| log.date),
        today,
    );
    HabitBreakdown {
        habit_id: habit.id.clone(),
        name: habit.name.clone(),
        color: habit.color.clone(),
        archived: habit.archived,
        total_logs: own.len() as u32,
        current_streak: streak.current_streak,
        longest_streak: streak.longest_streak,
        heatmap,
    }
}

fn local_hour(created_at_ms: i64, zone: UtcOffset) -> Option<u8> {
    let nanos = i128::from(created_at_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .map(|at| at.to_offset(zone).hour())
}

fn fraction(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(total)
    }
}
