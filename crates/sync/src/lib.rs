#![forbid(unsafe_code)]

mod engine;
mod env;
mod error;
mod events;

pub use engine::{
    DEFAULT_MIRROR_WINDOW_DAYS, DEFAULT_STREAK_LOOKBACK_DAYS, DrainReport, DrainStop,
    RejectedMutation, SyncConfig, SyncEngine, SyncState,
};
pub use env::{Clock, Connectivity, FixedClock, OnlineFlag, SystemClock};
pub use error::SyncError;
pub use events::SyncEvent;
