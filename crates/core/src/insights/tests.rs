use super::*;
use crate::ids::UserId;
use crate::model::{LogDate, NewHabit};

fn habit(name: &str) -> Habit {
    NewHabit::daily(
        HabitId::try_new(name.to_lowercase()).expect("habit id"),
        UserId::try_new("u1").expect("user id"),
        name,
    )
    .into_habit(0)
}

/// One log per day starting at 2024-06-01 (a Saturday).
fn history(habit: &Habit, completed: &[bool]) -> Vec<CompletionLog> {
    let mut date = LogDate::parse("2024-06-01").expect("date");
    let mut out = Vec::new();
    for &done in completed {
        out.push(CompletionLog {
            habit_id: habit.id.clone(),
            date,
            completed: done,
            value: if done { 1.0 } else { 0.0 },
            created_at_ms: 0,
            updated_at_ms: 0,
        });
        date = date.next_day().expect("next day");
    }
    out
}

fn titles(insights: &[Insight]) -> Vec<&str> {
    insights.iter().map(|i| i.title.as_str()).collect()
}

#[test]
fn low_completion_rate_suggests_a_boost() {
    let read = habit("Read");
    // Only weekdays missed so the weekend rule stays quiet.
    let mut pattern = vec![true, true];
    pattern.extend([false; 5]);
    let logs = history(&read, &pattern);
    let found = habit_insights(&read, &logs);
    assert_eq!(titles(&found), vec!["Boost: Read"]);
    assert_eq!(found[0].kind, InsightKind::Suggestion);
}

#[test]
fn no_completions_produce_no_boost() {
    let read = habit("Read");
    let logs = history(&read, &[false; 1]);
    assert!(habit_insights(&read, &logs).is_empty());
}

#[test]
fn high_completion_rate_is_a_milestone() {
    let run = habit("Run");
    let logs = history(&run, &[true; 12]);
    let found = habit_insights(&run, &logs);
    assert_eq!(titles(&found), vec!["Unstoppable at Run"]);
    assert_eq!(found[0].kind, InsightKind::Milestone);
}

#[test]
fn only_the_most_recent_window_is_judged() {
    let run = habit("Run");
    let mut pattern = vec![false; 10];
    pattern.extend([true; 14]);
    let logs = history(&run, &pattern);
    assert_eq!(titles(&habit_insights(&run, &logs)), vec!["Unstoppable at Run"]);
}

#[test]
fn missed_weekend_days_trigger_maintenance() {
    let gym = habit("Gym");
    // Sat and Sun missed, then a full week done.
    let mut pattern = vec![false, false];
    pattern.extend([true; 5]);
    let logs = history(&gym, &pattern);
    assert_eq!(
        titles(&habit_insights(&gym, &logs)),
        vec!["Boost: Gym", "Weekend Maintenance"]
    );
}

#[test]
fn archived_habits_are_skipped_and_recent_titles_filtered() {
    let read = habit("Read");
    let mut run = habit("Run");
    run.archived = true;
    let mut logs = history(&read, &[true; 12]);
    logs.extend(history(&run, &[true; 12]));

    let candidates = generate_insights(&[read, run], &logs);
    assert_eq!(titles(&candidates), vec!["Unstoppable at Read"]);

    let picked = pick_insight(&candidates, &Vec::<String>::new());
    assert_eq!(picked.map(|i| i.title.as_str()), Some("Unstoppable at Read"));
    assert_eq!(pick_insight(&candidates, &["Unstoppable at Read"][..]), None);
}
