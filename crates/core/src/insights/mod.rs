#![forbid(unsafe_code)]

use crate::ids::HabitId;
use crate::model::{CompletionLog, Habit};
use serde::{Deserialize, Serialize};

/// Number of most recent logs a habit is judged on.
pub const INSIGHT_WINDOW: usize = 14;
const LOW_RATE: f64 = 0.5;
const HIGH_RATE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightKind {
    Suggestion,
    Milestone,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub habit_id: HabitId,
    pub title: String,
    pub message: String,
}

/// Candidate insights for one habit, judged on its most recent logs.
pub fn habit_insights(habit: &Habit, logs: &[CompletionLog]) -> Vec<Insight> {
    let mut recent = logs
        .iter()
        .filter(|log| log.habit_id == habit.id)
        .collect::<Vec<_>>();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(INSIGHT_WINDOW);

    let completed = recent.iter().filter(|log| log.completed).count();
    let rate = completed as f64 / INSIGHT_WINDOW as f64;
    let mut out = Vec::new();

    if rate > 0.0 && rate < LOW_RATE {
        out.push(Insight {
            kind: InsightKind::Suggestion,
            habit_id: habit.id.clone(),
            title: format!("Boost: {}", habit.name),
            message: format!(
                "You've missed {} a few times lately. Try moving it to 5 minutes earlier to build momentum!",
                habit.name
            ),
        });
    }
    if rate > HIGH_RATE {
        out.push(Insight {
            kind: InsightKind::Milestone,
            habit_id: habit.id.clone(),
            title: format!("Unstoppable at {}", habit.name),
            message: "80%+ completion rate! You're mastering this ritual. Ever thought about increasing the difficulty?".to_string(),
        });
    }

    let weekend_misses = recent
        .iter()
        .filter(|log| !log.completed && log.date.is_weekend())
        .count();
    if weekend_misses > 1 {
        out.push(Insight {
            kind: InsightKind::Suggestion,
            habit_id: habit.id.clone(),
            title: "Weekend Maintenance".to_string(),
            message: format!(
                "Consistency dips on weekends for {}. Focus on an \"Easy Mode\" version on Sat/Sun to keep the fire alive.",
                habit.name
            ),
        });
    }
    out
}

/// Candidates across all non-archived habits, in habit order.
pub fn generate_insights(habits: &[Habit], logs: &[CompletionLog]) -> Vec<Insight> {
    habits
        .iter()
        .filter(|habit| !habit.archived)
        .flat_map(|habit| habit_insights(habit, logs))
        .collect()
}

/// First candidate whose title is not among `recently_sent`.
pub fn pick_insight<'a, S>(candidates: &'a [Insight], recently_sent: &[S]) -> Option<&'a Insight>
where
    S: AsRef<str>,
{
    candidates
        .iter()
        .find(|insight| !recently_sent.iter().any(|t| t.as_ref() == insight.title))
}

#[cfg(test)]
mod tests;
