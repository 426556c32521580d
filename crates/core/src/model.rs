#![forbid(unsafe_code)]

use crate::ids::{HabitId, UserId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Month, OffsetDateTime, UtcOffset, Weekday};

pub const DEFAULT_HABIT_COLOR: &str = "#3b82f6";
pub const DEFAULT_TARGET_VALUE: f64 = 1.0;

/// Calendar day of a completion log, always rendered as `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogDate(Date);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogDateError {
    InvalidFormat,
    OutOfRange,
}

impl LogDateError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "date must be formatted as YYYY-MM-DD",
            Self::OutOfRange => "date is not a valid calendar day",
        }
    }
}

impl std::fmt::Display for LogDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for LogDateError {}

impl LogDate {
    pub fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, LogDateError> {
        let month = Month::try_from(month).map_err(|_| LogDateError::OutOfRange)?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| LogDateError::OutOfRange)
    }

    pub fn parse(value: &str) -> Result<Self, LogDateError> {
        let bytes = value.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(LogDateError::InvalidFormat);
        }
        let digits = |range: std::ops::Range<usize>| -> Result<u32, LogDateError> {
            let part = &value[range];
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(LogDateError::InvalidFormat);
            }
            part.parse::<u32>().map_err(|_| LogDateError::InvalidFormat)
        };
        let year = digits(0..4)?;
        let month = digits(5..7)?;
        let day = digits(8..10)?;
        Self::from_ymd(year as i32, month as u8, day as u8)
    }

    /// The calendar day `now` falls on when observed from `zone`.
    pub fn today_in(now: OffsetDateTime, zone: UtcOffset) -> Self {
        Self(now.to_offset(zone).date())
    }

    pub fn date(self) -> Date {
        self.0
    }

    pub fn previous_day(self) -> Option<Self> {
        self.0.previous_day().map(Self)
    }

    pub fn next_day(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Signed number of days from `earlier` to `self`.
    pub fn days_since(self, earlier: Self) -> i64 {
        i64::from(self.0.to_julian_day()) - i64::from(earlier.0.to_julian_day())
    }

    pub fn minus_days(self, days: u32) -> Self {
        let julian = self.0.to_julian_day().saturating_sub(days as i32);
        Date::from_julian_day(julian).map(Self).unwrap_or(self)
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn is_weekend(self) -> bool {
        matches!(self.0.weekday(), Weekday::Saturday | Weekday::Sunday)
    }

    pub fn first_of_year(self) -> Self {
        Self::from_ymd(self.year(), 1, 1).unwrap_or(self)
    }

    pub fn last_of_year(self) -> Self {
        Self::from_ymd(self.year(), 12, 31).unwrap_or(self)
    }
}

impl std::fmt::Display for LogDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl std::str::FromStr for LogDate {
    type Err = LogDateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for LogDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of calendar days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: LogDate,
    pub end: LogDate,
}

impl DateRange {
    pub fn new(start: LogDate, end: LogDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// `days` calendar days ending at `today`, both ends included.
    pub fn trailing_days(today: LogDate, days: u32) -> Self {
        Self::new(today.minus_days(days.saturating_sub(1)), today)
    }

    pub fn calendar_year(of: LogDate) -> Self {
        Self::new(of.first_of_year(), of.last_of_year())
    }

    /// Smallest range covering both `self` and `other`.
    pub fn span(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn contains(&self, date: LogDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogScope {
    Habit(HabitId),
    User(UserId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cadence {
    Daily,
    Weekly,
    Custom,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Custom => "CUSTOM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "CUSTOM" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalKind {
    Binary,
    Quantitative,
}

impl GoalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "BINARY",
            Self::Quantitative => "QUANTITATIVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BINARY" => Some(Self::Binary),
            "QUANTITATIVE" => Some(Self::Quantitative),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub user_id: UserId,
    pub name: String,
    pub color: String,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub cadence: Cadence,
    pub goal_kind: GoalKind,
    pub target_value: f64,
    pub reminder_time: Option<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub archived: bool,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionLog {
    pub habit_id: HabitId,
    pub date: LogDate,
    pub completed: bool,
    pub value: f64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Payload of a habit creation; the id is chosen by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewHabit {
    pub id: HabitId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub cadence: Cadence,
    pub goal_kind: GoalKind,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub reminder_time: Option<String>,
}

impl NewHabit {
    pub fn daily(id: HabitId, user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            color: None,
            category: None,
            icon: None,
            cadence: Cadence::Daily,
            goal_kind: GoalKind::Binary,
            target_value: None,
            reminder_time: None,
        }
    }

    pub fn into_habit(self, created_at_ms: i64) -> Habit {
        Habit {
            id: self.id,
            user_id: self.user_id,
            name: self.name.trim().to_string(),
            color: self
                .color
                .unwrap_or_else(|| DEFAULT_HABIT_COLOR.to_string()),
            category: self.category,
            icon: self.icon,
            cadence: self.cadence,
            goal_kind: self.goal_kind,
            target_value: self.target_value.unwrap_or(DEFAULT_TARGET_VALUE),
            reminder_time: self.reminder_time,
            current_streak: 0,
            longest_streak: 0,
            archived: false,
            created_at_ms,
        }
    }
}

/// Partial update of a habit. `Some(None)` on a nullable field clears it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HabitPatch {
    pub habit_id: HabitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<Cadence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_kind: Option<GoalKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub reminder_time: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl HabitPatch {
    pub fn for_habit(habit_id: HabitId) -> Self {
        Self {
            habit_id,
            name: None,
            color: None,
            category: None,
            icon: None,
            cadence: None,
            goal_kind: None,
            target_value: None,
            reminder_time: None,
            archived: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.color.is_none()
            && self.category.is_none()
            && self.icon.is_none()
            && self.cadence.is_none()
            && self.goal_kind.is_none()
            && self.target_value.is_none()
            && self.reminder_time.is_none()
            && self.archived.is_none()
    }

    pub fn apply_to(&self, habit: &mut Habit) {
        if let Some(name) = &self.name {
            habit.name = name.trim().to_string();
        }
        if let Some(color) = &self.color {
            habit.color = color.clone();
        }
        if let Some(category) = &self.category {
            habit.category = category.clone();
        }
        if let Some(icon) = &self.icon {
            habit.icon = icon.clone();
        }
        if let Some(cadence) = self.cadence {
            habit.cadence = cadence;
        }
        if let Some(goal_kind) = self.goal_kind {
            habit.goal_kind = goal_kind;
        }
        if let Some(target_value) = self.target_value {
            habit.target_value = target_value;
        }
        if let Some(reminder_time) = &self.reminder_time {
            habit.reminder_time = reminder_time.clone();
        }
        if let Some(archived) = self.archived {
            habit.archived = archived;
        }
    }
}

/// One (habit, date) completion write. Re-applying the same entry is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub habit_id: HabitId,
    pub date: LogDate,
    pub completed: bool,
    #[serde(default)]
    pub value: Option<f64>,
}

impl LogEntry {
    pub fn new(habit_id: HabitId, date: LogDate, completed: bool) -> Self {
        Self {
            habit_id,
            date,
            completed,
            value: None,
        }
    }

    /// Stored progress value: an explicit non-zero value wins, otherwise 1 for done and 0 for not.
    pub fn resolved_value(&self) -> f64 {
        match self.value {
            Some(value) if value != 0.0 => value,
            _ if self.completed => 1.0,
            _ => 0.0,
        }
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_date_parse_is_strict() {
        assert_eq!(
            LogDate::parse("2024-02-29").unwrap().to_string(),
            "2024-02-29"
        );
        assert_eq!(
            LogDate::parse("2023-02-29").unwrap_err(),
            LogDateError::OutOfRange
        );
        assert_eq!(
            LogDate::parse("2024-2-29").unwrap_err(),
            LogDateError::InvalidFormat
        );
        assert_eq!(
            LogDate::parse("+024-02-09").unwrap_err(),
            LogDateError::InvalidFormat
        );
    }

    #[test]
    fn days_since_crosses_month_and_year_boundaries() {
        let a = LogDate::parse("2023-12-31").unwrap();
        let b = LogDate::parse("2024-01-01").unwrap();
        assert_eq!(b.days_since(a), 1);
        assert_eq!(a.days_since(b), -1);
        assert_eq!(b.previous_day(), Some(a));
        assert_eq!(b.minus_days(1), a);
    }

    #[test]
    fn trailing_range_includes_both_ends() {
        let today = LogDate::parse("2024-03-14").unwrap();
        let range = DateRange::trailing_days(today, 14);
        assert_eq!(range.start.to_string(), "2024-03-01");
        assert!(range.contains(today));
        assert!(!range.contains(LogDate::parse("2024-02-29").unwrap()));
    }

    #[test]
    fn span_covers_a_lookback_that_starts_last_year() {
        let today = LogDate::parse("2024-01-05").unwrap();
        let range = DateRange::calendar_year(today).span(DateRange::trailing_days(today, 30));
        assert_eq!(range.start.to_string(), "2023-12-07");
        assert_eq!(range.end.to_string(), "2024-12-31");
    }

    #[test]
    fn resolved_value_follows_completion_default() {
        let habit = HabitId::try_new("h1").unwrap();
        let date = LogDate::parse("2024-01-01").unwrap();
        assert_eq!(LogEntry::new(habit.clone(), date, true).resolved_value(), 1.0);
        assert_eq!(LogEntry::new(habit.clone(), date, false).resolved_value(), 0.0);
        let mut entry = LogEntry::new(habit, date, true);
        entry.value = Some(3.5);
        assert_eq!(entry.resolved_value(), 3.5);
    }

    #[test]
    fn patch_distinguishes_clear_from_keep() {
        let raw = r#"{"habit_id":"h1","reminder_time":null}"#;
        let patch: HabitPatch = serde_json::from_str(raw).unwrap();
        assert_eq!(patch.reminder_time, Some(None));
        assert_eq!(patch.category, None);

        let raw = r#"{"habit_id":"h1","name":"Read"}"#;
        let patch: HabitPatch = serde_json::from_str(raw).unwrap();
        assert_eq!(patch.reminder_time, None);
        assert!(!patch.is_empty());
    }
}
