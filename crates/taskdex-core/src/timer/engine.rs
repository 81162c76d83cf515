//! Session state machine.
//!
//! The engine is a pure reducer over [`SessionState`]. It owns no clock:
//! the caller delivers one `tick()` per second and forwards user commands.
//! Methods that end a phase return a [`Transition`] describing what
//! happened; side effects (encounters, callbacks, audio) are the caller's
//! job and run only after the state change is committed.
//!
//! ## State Transitions
//!
//! ```text
//! Work(1) -> Break(1) -> Work(2) -> ... -> Break(R) -> Finished
//! ```
//!
//! A break is granted after every work phase, including the last one.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(config);
//! // Once per second:
//! if let Some(transition) = engine.tick() {
//!     // dispatch side effects
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::config::{Phase, SessionConfig, Stage};

/// Mutable state of one running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// 1-indexed.
    pub current_repetition: u32,
    pub phase: Phase,
    pub seconds_remaining: u64,
    pub is_running: bool,
    pub completed_repetitions: u32,
    pub finished: bool,
}

/// A phase boundary produced by a timeout or a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    WorkCompleted { repetition: u32, next: Stage },
    BreakCompleted { repetition: u32, next: Stage },
}

impl Transition {
    pub fn next(&self) -> Stage {
        match self {
            Transition::WorkCompleted { next, .. } | Transition::BreakCompleted { next, .. } => *next,
        }
    }

    pub fn finishes_session(&self) -> bool {
        self.next() == Stage::Finished
    }
}

/// Core session engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEngine {
    config: SessionConfig,
    state: SessionState,
}

impl SessionEngine {
    /// Create an engine at the start of the first work phase, running.
    pub fn new(config: SessionConfig) -> Self {
        let state = SessionState {
            current_repetition: 1,
            phase: Phase::Work,
            seconds_remaining: config.work_secs(),
            is_running: true,
            completed_repetitions: 0,
            finished: false,
        };
        Self { config, state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        if self.state.finished {
            return Stage::Finished;
        }
        match self.state.phase {
            Phase::Work => Stage::Work(self.state.current_repetition),
            Phase::Break => Stage::Break(self.state.current_repetition),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// True when the clock should be delivering ticks.
    pub fn is_running(&self) -> bool {
        self.state.is_running && !self.state.finished
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.state.seconds_remaining
    }

    /// Length of the current phase in seconds.
    pub fn total_secs(&self) -> u64 {
        self.config.phase_secs(self.state.phase)
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn phase_progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.state.seconds_remaining as f64 / total as f64)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Advance the countdown by one second.
    ///
    /// Fires exactly one transition when the countdown hits zero. A phase
    /// configured with zero length times out on its first tick.
    pub fn tick(&mut self) -> Option<Transition> {
        if !self.is_running() {
            return None;
        }
        if self.state.seconds_remaining <= 1 {
            self.state.seconds_remaining = 0;
            return Some(self.complete_phase());
        }
        self.state.seconds_remaining -= 1;
        None
    }

    /// End the current phase now, exactly as a timeout would.
    pub fn skip(&mut self) -> Option<Transition> {
        if self.state.finished {
            return None;
        }
        self.state.seconds_remaining = 0;
        Some(self.complete_phase())
    }

    /// Returns true if the session was running and is now paused.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state.is_running = false;
        true
    }

    /// Returns true if the session was paused and is now running.
    pub fn resume(&mut self) -> bool {
        if self.state.finished || self.state.is_running {
            return false;
        }
        self.state.is_running = true;
        true
    }

    /// Flip between running and paused. Returns the new running flag.
    pub fn toggle_pause(&mut self) -> bool {
        if self.state.is_running {
            self.pause();
        } else {
            self.resume();
        }
        self.is_running()
    }

    /// Abandon the session. Returns false if it had already finished.
    pub fn end(&mut self) -> bool {
        if self.state.finished {
            return false;
        }
        self.finish();
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_phase(&mut self) -> Transition {
        let repetition = self.state.current_repetition;
        match self.state.phase {
            Phase::Work => {
                // `<=` keeps a break after the final work phase.
                if repetition <= self.config.repetition_count {
                    self.state.phase = Phase::Break;
                    self.state.seconds_remaining = self.config.break_secs();
                } else {
                    self.finish();
                }
                Transition::WorkCompleted {
                    repetition,
                    next: self.stage(),
                }
            }
            Phase::Break => {
                self.state.completed_repetitions += 1;
                if repetition < self.config.repetition_count {
                    self.state.current_repetition += 1;
                    self.state.phase = Phase::Work;
                    self.state.seconds_remaining = self.config.work_secs();
                } else {
                    self.finish();
                }
                Transition::BreakCompleted {
                    repetition,
                    next: self.stage(),
                }
            }
        }
    }

    fn finish(&mut self) {
        self.state.finished = true;
        self.state.is_running = false;
        self.state.seconds_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run_ticks(engine: &mut SessionEngine, n: u64) -> Vec<Transition> {
        (0..n).filter_map(|_| engine.tick()).collect()
    }

    #[test]
    fn starts_running_in_first_work_phase() {
        let engine = SessionEngine::new(SessionConfig::new(25, 5, 4));
        assert_eq!(engine.stage(), Stage::Work(1));
        assert!(engine.is_running());
        assert_eq!(engine.seconds_remaining(), 1500);
    }

    #[test]
    fn thirty_minute_work_single_repetition() {
        let mut engine = SessionEngine::new(SessionConfig::new(30, 5, 1));

        let t = run_ticks(&mut engine, 1799);
        assert!(t.is_empty());
        assert_eq!(engine.seconds_remaining(), 1);

        let t = run_ticks(&mut engine, 1);
        assert_eq!(
            t,
            vec![Transition::WorkCompleted {
                repetition: 1,
                next: Stage::Break(1)
            }]
        );
        assert_eq!(engine.seconds_remaining(), 300);

        let t = run_ticks(&mut engine, 300);
        assert_eq!(
            t,
            vec![Transition::BreakCompleted {
                repetition: 1,
                next: Stage::Finished
            }]
        );
        assert!(engine.is_finished());
        assert_eq!(engine.state().completed_repetitions, 1);
    }

    #[test]
    fn break_advances_to_next_work() {
        let mut engine = SessionEngine::new(SessionConfig::new(1, 1, 2));
        engine.skip();
        let t = engine.skip().unwrap();
        assert_eq!(
            t,
            Transition::BreakCompleted {
                repetition: 1,
                next: Stage::Work(2)
            }
        );
        assert_eq!(engine.state().current_repetition, 2);
        assert_eq!(engine.seconds_remaining(), 60);
    }

    #[test]
    fn pause_halts_countdown_and_resume_continues() {
        let mut engine = SessionEngine::new(SessionConfig::new(10, 5, 1));
        run_ticks(&mut engine, 5);
        assert!(engine.pause());
        assert!(!engine.pause());
        let before = engine.seconds_remaining();
        assert!(run_ticks(&mut engine, 100).is_empty());
        assert_eq!(engine.seconds_remaining(), before);
        assert!(engine.resume());
        engine.tick();
        assert_eq!(engine.seconds_remaining(), before - 1);
    }

    #[test]
    fn pause_resume_pair_leaves_state_unchanged() {
        let mut engine = SessionEngine::new(SessionConfig::new(10, 5, 1));
        run_ticks(&mut engine, 42);
        let before = engine.state().clone();
        engine.toggle_pause();
        engine.toggle_pause();
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn skip_keeps_pause_flag() {
        let mut engine = SessionEngine::new(SessionConfig::new(10, 5, 2));
        engine.pause();
        engine.skip();
        assert_eq!(engine.stage(), Stage::Break(1));
        assert!(!engine.is_running());
    }

    #[test]
    fn zero_length_phase_times_out_on_next_tick() {
        let mut engine = SessionEngine::new(SessionConfig::new(0, 0, 1));
        assert!(engine.tick().is_some());
        assert_eq!(engine.stage(), Stage::Break(1));
        assert!(engine.tick().unwrap().finishes_session());
    }

    #[test]
    fn zero_repetitions_finish_after_first_work() {
        let mut engine = SessionEngine::new(SessionConfig::new(1, 1, 0));
        let t = engine.skip().unwrap();
        assert_eq!(
            t,
            Transition::WorkCompleted {
                repetition: 1,
                next: Stage::Finished
            }
        );
        assert!(engine.skip().is_none());
    }

    #[test]
    fn end_stops_everything() {
        let mut engine = SessionEngine::new(SessionConfig::default());
        assert!(engine.end());
        assert!(!engine.end());
        assert!(engine.tick().is_none());
        assert!(!engine.resume());
        assert_eq!(engine.stage(), Stage::Finished);
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let mut engine = SessionEngine::new(SessionConfig::new(1, 1, 1));
        assert_eq!(engine.phase_progress(), 0.0);
        run_ticks(&mut engine, 30);
        assert!((engine.phase_progress() - 0.5).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn full_run_has_r_work_and_r_break_phases(
            reps in 1u32..6,
            work in 0u32..4,
            brk in 0u32..4,
        ) {
            let mut engine = SessionEngine::new(SessionConfig::new(work, brk, reps));
            let mut works = 0;
            let mut breaks = 0;
            let limit = u64::from(reps) * (u64::from(work + brk) * 60 + 2) + 10;
            for _ in 0..limit {
                match engine.tick() {
                    Some(Transition::WorkCompleted { .. }) => works += 1,
                    Some(Transition::BreakCompleted { .. }) => breaks += 1,
                    None => {}
                }
                let state = engine.state();
                prop_assert!(state.current_repetition >= 1);
                prop_assert!(state.current_repetition <= reps);
            }
            prop_assert!(engine.is_finished());
            prop_assert_eq!(works, reps);
            prop_assert_eq!(breaks, reps);
            prop_assert_eq!(engine.state().completed_repetitions, reps);
        }

        #[test]
        fn skip_matches_timeout(reps in 1u32..4, steps in 0usize..8) {
            let cfg = SessionConfig::new(2, 1, reps);
            let mut skipped = SessionEngine::new(cfg.clone());
            let mut timed = SessionEngine::new(cfg);
            for _ in 0..steps {
                let a = skipped.skip();
                let mut b = None;
                while b.is_none() && !timed.is_finished() {
                    b = timed.tick();
                }
                prop_assert_eq!(a, b);
                prop_assert_eq!(skipped.state(), timed.state());
            }
        }
    }
}
