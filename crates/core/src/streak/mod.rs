#![forbid(unsafe_code)]

//! Consecutive-day streaks over completion dates.
//!
//! A streak is "live" only while its newest day is today or yesterday in the
//! caller's zone; the longest run is measured over the whole input regardless.

use crate::model::{CompletionLog, LogDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::{OffsetDateTime, UtcOffset};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Streaks for a set of completed dates, with "today" taken from `reference_now` in `zone`.
pub fn compute_streak<I>(dates: I, reference_now: OffsetDateTime, zone: UtcOffset) -> StreakSummary
where
    I: IntoIterator<Item = LogDate>,
{
    streak_as_of(dates, LogDate::today_in(reference_now, zone))
}

/// Same as [`compute_streak`] but ignores logs that are not marked completed.
pub fn compute_streak_from_logs(
    logs: &[CompletionLog],
    reference_now: OffsetDateTime,
    zone: UtcOffset,
) -> StreakSummary {
    compute_streak(completed_dates(logs), reference_now, zone)
}

pub fn streak_as_of<I>(dates: I, today: LogDate) -> StreakSummary
where
    I: IntoIterator<Item = LogDate>,
{
    let distinct = dates.into_iter().collect::<BTreeSet<_>>();
    let descending = distinct.into_iter().rev().collect::<Vec<_>>();
    let Some(&newest) = descending.first() else {
        return StreakSummary::default();
    };

    StreakSummary {
        current_streak: current_run(&descending, newest, today),
        longest_streak: longest_run(&descending),
    }
}

fn current_run(descending: &[LogDate], newest: LogDate, today: LogDate) -> u32 {
    let live = newest == today || Some(newest) == today.previous_day();
    if !live {
        return 0;
    }

    let mut run = 0u32;
    let mut expected = Some(newest);
    for &date in descending {
        if Some(date) != expected {
            break;
        }
        run += 1;
        expected = date.previous_day();
    }
    run
}

fn longest_run(descending: &[LogDate]) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<LogDate> = None;
    for &date in descending {
        run = match previous {
            Some(prev) if prev.days_since(date) == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

pub fn completed_dates(logs: &[CompletionLog]) -> impl Iterator<Item = LogDate> + '_ {
    logs.iter().filter(|log| log.completed).map(|log| log.date)
}

/// Per-day count of completed logs ("heatmap" density).
pub fn daily_counts(logs: &[CompletionLog]) -> BTreeMap<LogDate, u32> {
    let mut counts = BTreeMap::new();
    for date in completed_dates(logs) {
        *counts.entry(date).or_insert(0) += 1;
    }
    counts
}
