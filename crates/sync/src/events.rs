#![forbid(unsafe_code)]

use crossbeam::channel::{Receiver, Sender, unbounded};
use ritual_core::MutationKind;
use ritual_core::ids::{HabitId, MutationId, UserId};
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    MutationQueued {
        id: MutationId,
        kind: MutationKind,
        habit_id: HabitId,
    },
    MutationApplied {
        id: MutationId,
        kind: MutationKind,
        habit_id: HabitId,
    },
    MutationRejected {
        id: MutationId,
        kind: MutationKind,
        habit_id: HabitId,
        message: String,
    },
    SyncStarted {
        pending: usize,
    },
    SyncFinished {
        applied: usize,
        failed: usize,
        remaining: usize,
    },
    ConnectivityChanged {
        online: bool,
    },
    MirrorRefreshed {
        user_id: UserId,
        habits: usize,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Subscribers(Mutex<Vec<Sender<SyncEvent>>>);

impl Subscribers {
    pub(crate) fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = unbounded();
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Delivers to every live subscriber and forgets the ones that hung up.
    pub(crate) fn emit(&self, event: SyncEvent) {
        let mut senders = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
