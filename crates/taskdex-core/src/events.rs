use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encounter::{Category, EncounterBatch};
use crate::timer::{SessionConfig, Stage};

/// Every state change in a running session produces an Event.
/// Front ends subscribe to them; the latest full state is published
/// separately as a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        config: SessionConfig,
        at: DateTime<Utc>,
    },
    PhaseStarted {
        stage: Stage,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    WorkCompleted {
        repetition: u32,
        duration_minutes: u32,
        category: Category,
        skipped: bool,
        at: DateTime<Utc>,
    },
    /// A new batch is on offer for the break that just started.
    EncountersSpawned {
        batch: EncounterBatch,
        capacity: usize,
        at: DateTime<Utc>,
    },
    BreakCompleted {
        repetition: u32,
        skipped: bool,
        at: DateTime<Utc>,
    },
    SelectionChanged {
        selected: Vec<usize>,
        at: DateTime<Utc>,
    },
    /// Persistence call issued; selection is frozen until it resolves.
    CatchStarted {
        names: Vec<String>,
        experience: u32,
        at: DateTime<Utc>,
    },
    CatchConfirmed {
        indices: Vec<usize>,
        names: Vec<String>,
        experience: u32,
        at: DateTime<Utc>,
    },
    /// Persistence failed. The selection is kept so the user can retry.
    CatchFailed {
        message: String,
        retryable: bool,
        at: DateTime<Utc>,
    },
    SessionFinished {
        completed_repetitions: u32,
        at: DateTime<Utc>,
    },
    /// The user left before the session finished.
    SessionEnded {
        completed_repetitions: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// True for the two events that close a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::SessionFinished { .. } | Event::SessionEnded { .. })
    }
}
