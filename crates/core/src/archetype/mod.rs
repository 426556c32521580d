#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub const MIN_LOGS_FOR_ARCHETYPE: u32 = 15;
pub const MASTER_LONGEST_STREAK: u32 = 21;
pub const MOMENTUM_CURRENT_STREAK: u32 = 10;
pub const TIME_OF_DAY_FRACTION: f64 = 0.6;
pub const SAGE_LOGS_PER_ACTIVE_DAY: f64 = 2.0;

/// Hours (local) before which a log counts as early, and after which it counts as late.
pub const EARLY_BEFORE_HOUR: u8 = 10;
pub const LATE_AFTER_HOUR: u8 = 21;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Archetype {
    Novice,
    Sage,
    Momentum,
    Dawn,
    Night,
    Master,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ArchetypeProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub gradient: &'static str,
}

impl Archetype {
    pub const ALL: [Archetype; 6] = [
        Self::Novice,
        Self::Sage,
        Self::Momentum,
        Self::Dawn,
        Self::Night,
        Self::Master,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Novice => "NOVICE",
            Self::Sage => "SAGE",
            Self::Momentum => "MOMENTUM",
            Self::Dawn => "DAWN",
            Self::Night => "NIGHT",
            Self::Master => "MASTER",
        }
    }

    pub fn profile(self) -> &'static ArchetypeProfile {
        match self {
            Self::Novice => &NOVICE,
            Self::Sage => &SAGE,
            Self::Momentum => &MOMENTUM,
            Self::Dawn => &DAWN,
            Self::Night => &NIGHT,
            Self::Master => &MASTER,
        }
    }
}

const NOVICE: ArchetypeProfile = ArchetypeProfile {
    name: "Ritual Novice",
    description: "You're just beginning your journey of discipline. Every great master started exactly here.",
    icon: "🌱",
    color: "#10b981",
    gradient: "from-emerald-500/20 to-emerald-500/5",
};

const SAGE: ArchetypeProfile = ArchetypeProfile {
    name: "Consistent Sage",
    description: "Your consistency is legendary. You rarely miss a day, moving with calm, unwavering focus.",
    icon: "🧘",
    color: "#8b5cf6",
    gradient: "from-violet-500/20 to-violet-500/5",
};

const MOMENTUM: ArchetypeProfile = ArchetypeProfile {
    name: "Momentum Builder",
    description: "You move like a tidal wave. Once you start a streak, you're nearly impossible to stop.",
    icon: "🌊",
    color: "#3b82f6",
    gradient: "from-blue-500/20 to-blue-500/5",
};

const DAWN: ArchetypeProfile = ArchetypeProfile {
    name: "Dawn Breaker",
    description: "You conquer the day before the world wakes up. Your discipline is strongest in the morning light.",
    icon: "🌅",
    color: "#f59e0b",
    gradient: "from-amber-500/20 to-amber-500/5",
};

const NIGHT: ArchetypeProfile = ArchetypeProfile {
    name: "Night Owl",
    description: "While others sleep, you build. You find your deepest discipline in the quiet of the night.",
    icon: "🌙",
    color: "#6366f1",
    gradient: "from-indigo-500/20 to-indigo-500/5",
};

const MASTER: ArchetypeProfile = ArchetypeProfile {
    name: "Disciplined Master",
    description: "A powerhouse of habit formation. You've transformed effort into an effortless part of your soul.",
    icon: "⚔️",
    color: "#ef4444",
    gradient: "from-red-500/20 to-red-500/5",
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStats {
    /// Completed logs within the current year.
    pub total_logs: u32,
    /// Distinct dates with at least one completed log.
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub early_fraction: f64,
    pub late_fraction: f64,
}

/// First matching rule wins; anything below the activity floor stays `Novice`.
pub fn classify_archetype(stats: &ArchetypeStats) -> Archetype {
    if stats.total_logs < MIN_LOGS_FOR_ARCHETYPE {
        return Archetype::Novice;
    }
    if stats.longest_streak >= MASTER_LONGEST_STREAK {
        return Archetype::Master;
    }
    if stats.current_streak >= MOMENTUM_CURRENT_STREAK {
        return Archetype::Momentum;
    }
    if stats.early_fraction > TIME_OF_DAY_FRACTION {
        return Archetype::Dawn;
    }
    if stats.late_fraction > TIME_OF_DAY_FRACTION {
        return Archetype::Night;
    }
    let per_day = f64::from(stats.total_logs) / f64::from(stats.active_days.max(1));
    if per_day > SAGE_LOGS_PER_ACTIVE_DAY {
        return Archetype::Sage;
    }
    Archetype::Novice
}
