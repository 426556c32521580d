#![forbid(unsafe_code)]

pub mod archetype;
pub mod insights;
pub mod model;
pub mod mutation;
pub mod remote;
pub mod stats;
pub mod streak;
pub mod zone;

pub use archetype::{Archetype, ArchetypeProfile, ArchetypeStats, classify_archetype};
pub use model::*;
pub use mutation::{Mutation, MutationKind, PendingMutation, ValidationError};
pub use remote::{LogStore, RemoteError};
pub use stats::{HabitBreakdown, StatsSnapshot, aggregate_stats};
pub use streak::{StreakSummary, compute_streak, compute_streak_from_logs, streak_as_of};

pub mod ids {
    use serde::{Deserialize, Serialize};

    const MAX_ID_LEN: usize = 128;

    macro_rules! string_id {
        ($name:ident, $field:literal) => {
            #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name(String);

            impl $name {
                pub const FIELD: &'static str = $field;

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn into_string(self) -> String {
                    self.0
                }

                pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
                    let value = value.into();
                    validate_id(&value)?;
                    Ok(Self(value))
                }
            }

            impl TryFrom<String> for $name {
                type Error = IdError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    string_id!(UserId, "user_id");
    string_id!(HabitId, "habit_id");
    string_id!(MutationId, "mutation_id");

    impl HabitId {
        /// Client-side id so an offline create can be referenced by later queued logs.
        pub fn generate() -> Self {
            Self(uuid::Uuid::new_v4().to_string())
        }
    }

    impl MutationId {
        pub fn generate() -> Self {
            Self(uuid::Uuid::new_v4().to_string())
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum IdError {
        Empty,
        TooLong,
        InvalidChar { ch: char, index: usize },
    }

    impl IdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "id must not be empty",
                Self::TooLong => "id is too long",
                Self::InvalidChar { .. } => "id may only contain [A-Za-z0-9_-]",
            }
        }
    }

    impl std::fmt::Display for IdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::InvalidChar { ch, index } => {
                    write!(f, "{} (got {ch:?} at {index})", self.message())
                }
                _ => f.write_str(self.message()),
            }
        }
    }

    impl std::error::Error for IdError {}

    fn validate_id(value: &str) -> Result<(), IdError> {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value.len() > MAX_ID_LEN {
            return Err(IdError::TooLong);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                continue;
            }
            return Err(IdError::InvalidChar { ch, index });
        }
        Ok(())
    }

}
