#![forbid(unsafe_code)]

use crate::ids::{HabitId, MutationId};
use crate::model::{HabitPatch, LogEntry, NewHabit};
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 120;
const MAX_LABEL_LEN: usize = 64;
const MAX_TARGET_VALUE: f64 = 1_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    CreateHabit,
    UpdateHabit,
    DeleteHabit,
    LogHabit,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateHabit => "CREATE_HABIT",
            Self::UpdateHabit => "UPDATE_HABIT",
            Self::DeleteHabit => "DELETE_HABIT",
            Self::LogHabit => "LOG_HABIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATE_HABIT" => Some(Self::CreateHabit),
            "UPDATE_HABIT" => Some(Self::UpdateHabit),
            "DELETE_HABIT" => Some(Self::DeleteHabit),
            "LOG_HABIT" => Some(Self::LogHabit),
            _ => None,
        }
    }
}

/// A write intent against the authoritative store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    CreateHabit(NewHabit),
    UpdateHabit(HabitPatch),
    DeleteHabit { habit_id: HabitId },
    LogHabit(LogEntry),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::CreateHabit(_) => MutationKind::CreateHabit,
            Self::UpdateHabit(_) => MutationKind::UpdateHabit,
            Self::DeleteHabit { .. } => MutationKind::DeleteHabit,
            Self::LogHabit(_) => MutationKind::LogHabit,
        }
    }

    pub fn habit_id(&self) -> &HabitId {
        match self {
            Self::CreateHabit(new) => &new.id,
            Self::UpdateHabit(patch) => &patch.habit_id,
            Self::DeleteHabit { habit_id } => habit_id,
            Self::LogHabit(entry) => &entry.habit_id,
        }
    }

    /// Rejects payloads that could never be applied. Runs before anything is queued.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::CreateHabit(new) => {
                validate_name(&new.name)?;
                if let Some(color) = &new.color {
                    validate_color(color)?;
                }
                validate_optional_label("category", new.category.as_deref())?;
                validate_optional_label("icon", new.icon.as_deref())?;
                if let Some(target) = new.target_value {
                    validate_target_value(target)?;
                }
                if let Some(reminder) = &new.reminder_time {
                    validate_reminder_time(reminder)?;
                }
                Ok(())
            }
            Self::UpdateHabit(patch) => {
                if patch.is_empty() {
                    return Err(ValidationError::EmptyPatch);
                }
                if let Some(name) = &patch.name {
                    validate_name(name)?;
                }
                if let Some(color) = &patch.color {
                    validate_color(color)?;
                }
                if let Some(category) = &patch.category {
                    validate_optional_label("category", category.as_deref())?;
                }
                if let Some(icon) = &patch.icon {
                    validate_optional_label("icon", icon.as_deref())?;
                }
                if let Some(target) = patch.target_value {
                    validate_target_value(target)?;
                }
                if let Some(Some(reminder)) = &patch.reminder_time {
                    validate_reminder_time(reminder)?;
                }
                Ok(())
            }
            Self::DeleteHabit { .. } => Ok(()),
            Self::LogHabit(entry) => {
                if let Some(value) = entry.value
                    && (!value.is_finite() || value < 0.0)
                {
                    return Err(ValidationError::InvalidProgressValue);
                }
                Ok(())
            }
        }
    }
}

/// A mutation recorded in the local queue, waiting for confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub seq: i64,
    pub mutation: Mutation,
    pub enqueued_at_ms: i64,
}

impl PendingMutation {
    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }

    pub fn habit_id(&self) -> &HabitId {
        self.mutation.habit_id()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    EmptyName,
    NameTooLong,
    InvalidColor,
    LabelTooLong { field: &'static str },
    ContainsControl { field: &'static str },
    InvalidTargetValue,
    InvalidReminderTime,
    InvalidProgressValue,
    EmptyPatch,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyName | Self::NameTooLong => "INVALID_NAME",
            Self::InvalidColor => "INVALID_COLOR",
            Self::LabelTooLong { .. } | Self::ContainsControl { .. } => "INVALID_LABEL",
            Self::InvalidTargetValue => "INVALID_TARGET",
            Self::InvalidReminderTime => "INVALID_REMINDER",
            Self::InvalidProgressValue => "INVALID_VALUE",
            Self::EmptyPatch => "EMPTY_PATCH",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::NameTooLong => write!(f, "name must be at most {MAX_NAME_LEN} characters"),
            Self::InvalidColor => write!(f, "color must look like #rrggbb"),
            Self::LabelTooLong { field } => {
                write!(f, "{field} must be at most {MAX_LABEL_LEN} characters")
            }
            Self::ContainsControl { field } => write!(f, "{field} contains control characters"),
            Self::InvalidTargetValue => write!(f, "target value must be a positive number"),
            Self::InvalidReminderTime => write!(f, "reminder time must look like HH:MM"),
            Self::InvalidProgressValue => write!(f, "progress value must be a non-negative number"),
            Self::EmptyPatch => write!(f, "update carries no fields"),
        }
    }
}

impl std::error::Error for ValidationError {}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ContainsControl { field: "name" });
    }
    Ok(())
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    let Some(hex) = color.strip_prefix('#') else {
        return Err(ValidationError::InvalidColor);
    };
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidColor);
    }
    Ok(())
}

fn validate_optional_label(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return Ok(());
    };
    if value.chars().count() > MAX_LABEL_LEN {
        return Err(ValidationError::LabelTooLong { field });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ContainsControl { field });
    }
    Ok(())
}

fn validate_target_value(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 || value > MAX_TARGET_VALUE {
        return Err(ValidationError::InvalidTargetValue);
    }
    Ok(())
}

fn validate_reminder_time(value: &str) -> Result<(), ValidationError> {
    let Some((hours, minutes)) = value.split_once(':') else {
        return Err(ValidationError::InvalidReminderTime);
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(ValidationError::InvalidReminderTime);
    }
    let hours = hours
        .parse::<u8>()
        .map_err(|_| ValidationError::InvalidReminderTime)?;
    let minutes = minutes
        .parse::<u8>()
        .map_err(|_| ValidationError::InvalidReminderTime)?;
    if hours > 23 || minutes > 59 {
        return Err(ValidationError::InvalidReminderTime);
    }
    Ok(())
}
