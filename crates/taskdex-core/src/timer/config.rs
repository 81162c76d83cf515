use serde::{Deserialize, Serialize};

use crate::encounter::Category;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Break,
}

/// Where a session is in its work/break cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "repetition", rename_all = "lowercase")]
pub enum Stage {
    Work(u32),
    Break(u32),
    Finished,
}

/// Immutable input for one running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub repetition_count: u32,
    pub label: String,
    #[serde(default)]
    pub category: Category,
}

impl SessionConfig {
    pub fn new(work_minutes: u32, break_minutes: u32, repetition_count: u32) -> Self {
        Self {
            work_minutes,
            break_minutes,
            repetition_count,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Work phase length in seconds.
    ///
    /// Uses saturating arithmetic so absurd minute counts cannot overflow.
    pub fn work_secs(&self) -> u64 {
        u64::from(self.work_minutes).saturating_mul(60)
    }

    /// Break phase length in seconds.
    pub fn break_secs(&self) -> u64 {
        u64::from(self.break_minutes).saturating_mul(60)
    }

    pub fn phase_secs(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Work => self.work_secs(),
            Phase::Break => self.break_secs(),
        }
    }

    /// Report values the session would technically run with but that
    /// are almost certainly mistakes.
    ///
    /// The state machine never calls this; a zero-length phase simply
    /// times out on the next tick.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.work_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "work_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.repetition_count == 0 {
            return Err(ValidationError::InvalidValue {
                field: "repetition_count".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_minutes: 30,
            break_minutes: 5,
            repetition_count: 4,
            label: "Focus Session".into(),
            category: Category::Fire,
        }
    }
}
