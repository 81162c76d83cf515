//! Session runner: the event loop that owns one running session.
//!
//! One tokio task per session multiplexes three sources in a single
//! `select!` loop, so handlers never overlap:
//!
//! - user [`Command`]s from any [`SessionHandle`] / [`SessionCommander`],
//! - the one-second clock (only while running),
//! - the result of an in-flight catch save.
//!
//! Each transition is applied to the [`SessionEngine`] first, then its
//! side effects run in fixed order: encounter batch and reconciler reset,
//! completion hook, audio. Audio runs in its own task and never mutates
//! session state. When the loop exits the clock and any pending save
//! result go with it.

mod hooks;

pub use hooks::{Screen, SessionHooks};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use crate::audio::{AudioAsset, AudioGate, GestureKind};
use crate::catch::{CatchOutcome, CatchReconciler, CatchRequest};
use crate::encounter::{generate_encounters, Category, EncounterBatch, ItemSource};
use crate::error::{CoreError, PersistenceError};
use crate::events::Event;
use crate::timer::{SessionConfig, SessionEngine, SessionState, Stage, Transition};

const EVENT_CAPACITY: usize = 256;

/// User input for a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "arg", rename_all = "snake_case")]
pub enum Command {
    Pause,
    Resume,
    TogglePause,
    Skip,
    ToggleSelection(usize),
    ConfirmCatch,
    Gesture(GestureKind),
    End,
}

/// Latest observable state of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub label: String,
    pub category: Category,
    pub repetition_count: u32,
    pub stage: Stage,
    pub state: SessionState,
    pub total_secs: u64,
    pub phase_progress: f64,
    pub encounters: EncounterBatch,
    pub capacity: usize,
    pub selected: Vec<usize>,
    pub caught: Vec<usize>,
    pub saving: bool,
}

/// What a session achieved, returned when it exits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub completed_repetitions: u32,
    pub work_phases_completed: u32,
    pub caught: Vec<String>,
    pub experience_earned: u64,
    pub ended_by_user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Timeout,
    Skip,
}

struct PendingCatch {
    request: CatchRequest,
    task: JoinHandle<Result<(), PersistenceError>>,
}

pub struct SessionRunner {
    id: Uuid,
    engine: SessionEngine,
    reconciler: CatchReconciler,
    batch: EncounterBatch,
    source: Box<dyn ItemSource>,
    hooks: Arc<dyn SessionHooks>,
    audio: Arc<AudioGate>,
    tick_period: Duration,
    events: broadcast::Sender<Event>,
    snapshot: watch::Sender<SessionSnapshot>,
    pending: Option<PendingCatch>,
    summary: SessionSummary,
}

impl SessionRunner {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn ItemSource>,
        hooks: Arc<dyn SessionHooks>,
        audio: Arc<AudioGate>,
    ) -> Self {
        let id = Uuid::new_v4();
        let reconciler = CatchReconciler::new(config.work_minutes);
        let engine = SessionEngine::new(config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let batch = EncounterBatch::default();
        let (snapshot, _) = watch::channel(build_snapshot(id, &engine, &reconciler, &batch));
        Self {
            id,
            engine,
            reconciler,
            batch,
            source,
            hooks,
            audio,
            tick_period: Duration::from_secs(1),
            events,
            snapshot,
            pending: None,
            summary: SessionSummary {
                session_id: id,
                ..SessionSummary::default()
            },
        }
    }

    /// Override the clock period (demos and tests compress time).
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            self.tick_period = period;
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe before `spawn` to be sure of seeing `SessionStarted`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start the session on the current tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.id;
        let events = self.events.clone();
        let snapshot = self.snapshot.subscribe();
        let task = tokio::spawn(self.run(rx));
        SessionHandle {
            id,
            commander: SessionCommander { tx },
            events,
            snapshot,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> SessionSummary {
        let audio = self.audio.clone();
        tokio::spawn(async move { audio.preload().await });

        tracing::info!(
            session = %self.id,
            label = %self.engine.config().label,
            "session started"
        );
        self.emit(Event::SessionStarted {
            session_id: self.id,
            config: self.engine.config().clone(),
            at: Utc::now(),
        });
        self.emit_phase_started();

        let mut clock = self.new_clock();
        while !self.engine.is_finished() {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd) {
                            clock = self.new_clock();
                        }
                    }
                    None => {
                        tracing::info!(session = %self.id, "all handles dropped, tearing down");
                        self.close(true, false);
                    }
                },
                result = wait_pending(&mut self.pending), if self.pending.is_some() => {
                    self.finish_catch(result);
                }
                _ = clock.tick(), if self.engine.is_running() => {
                    if let Some(transition) = self.engine.tick() {
                        self.dispatch(transition, Cause::Timeout);
                        clock = self.new_clock();
                    }
                    self.publish();
                }
            }
        }

        if let Some(pending) = self.pending.take() {
            tracing::debug!(
                batch = pending.request.batch_id,
                "session closed with a save in flight, result will be discarded"
            );
        }
        self.summary.completed_repetitions = self.engine.state().completed_repetitions;
        self.summary
    }

    /// Returns true when the clock must be restarted.
    fn handle_command(&mut self, cmd: Command) -> bool {
        tracing::debug!(session = %self.id, ?cmd, "command");
        let restart = match cmd {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => {
                if self.engine.state().is_running {
                    self.pause()
                } else {
                    self.resume()
                }
            }
            Command::Skip => {
                if self.audio.mark_gesture(GestureKind::Skip) {
                    let audio = self.audio.clone();
                    tokio::spawn(async move { audio.unlock_all().await });
                }
                match self.engine.skip() {
                    Some(transition) => {
                        self.dispatch(transition, Cause::Skip);
                        true
                    }
                    None => false,
                }
            }
            Command::ToggleSelection(index) => {
                if self.reconciler.toggle_selection(index) {
                    self.emit(Event::SelectionChanged {
                        selected: self.reconciler.selected().iter().copied().collect(),
                        at: Utc::now(),
                    });
                }
                false
            }
            Command::ConfirmCatch => {
                self.begin_catch();
                false
            }
            Command::Gesture(kind) => {
                if self.audio.mark_gesture(kind) {
                    let audio = self.audio.clone();
                    tokio::spawn(async move { audio.unlock_all().await });
                }
                false
            }
            Command::End => {
                self.close(true, true);
                false
            }
        };
        self.publish();
        restart
    }

    fn pause(&mut self) -> bool {
        if self.engine.pause() {
            self.emit(Event::TimerPaused {
                seconds_remaining: self.engine.seconds_remaining(),
                at: Utc::now(),
            });
        }
        false
    }

    fn resume(&mut self) -> bool {
        if self.engine.resume() {
            self.emit(Event::TimerResumed {
                seconds_remaining: self.engine.seconds_remaining(),
                at: Utc::now(),
            });
            return true;
        }
        false
    }

    fn dispatch(&mut self, transition: Transition, cause: Cause) {
        let skipped = cause == Cause::Skip;
        tracing::info!(session = %self.id, ?transition, skipped, "phase transition");
        match transition {
            Transition::WorkCompleted { repetition, next } => {
                let config = self.engine.config().clone();

                // State first.
                let batch = generate_encounters(
                    self.batch.id + 1,
                    config.work_minutes,
                    config.category,
                    self.source.as_mut(),
                );
                self.reconciler.reset(&batch);
                self.batch = batch;
                self.summary.work_phases_completed += 1;
                self.publish();
                self.emit(Event::WorkCompleted {
                    repetition,
                    duration_minutes: config.work_minutes,
                    category: config.category,
                    skipped,
                    at: Utc::now(),
                });
                self.emit(Event::EncountersSpawned {
                    batch: self.batch.clone(),
                    capacity: self.reconciler.capacity(),
                    at: Utc::now(),
                });

                // Then the completion hook.
                if let Err(e) =
                    self.hooks
                        .on_work_session_complete(config.work_minutes, config.category, true)
                {
                    tracing::warn!(session = %self.id, "work completion hook failed: {e}");
                }

                // Then audio.
                let cues: &[AudioAsset] = if next == Stage::Finished {
                    &[AudioAsset::Spawn]
                } else {
                    &[AudioAsset::Spawn, AudioAsset::Caught]
                };
                self.play_cues(cues);
            }
            Transition::BreakCompleted { repetition, .. } => {
                // Fresh id so a save still in flight for the old batch is stale.
                self.batch = EncounterBatch {
                    id: self.batch.id + 1,
                    ..EncounterBatch::default()
                };
                self.reconciler.reset(&self.batch);
                self.publish();
                self.emit(Event::BreakCompleted {
                    repetition,
                    skipped,
                    at: Utc::now(),
                });
                if skipped {
                    self.play_cues(&[AudioAsset::Spawn]);
                }
            }
        }

        if transition.finishes_session() {
            self.close(false, false);
        } else {
            self.emit_phase_started();
        }
    }

    fn play_cues(&self, cues: &[AudioAsset]) {
        let audio = self.audio.clone();
        let cues = cues.to_vec();
        tokio::spawn(async move {
            for asset in cues {
                audio.unlock(asset).await;
                audio.play(asset).await;
            }
        });
    }

    fn begin_catch(&mut self) {
        let Some(request) = self.reconciler.begin_confirm() else {
            return;
        };
        let hooks = self.hooks.clone();
        let names = request.names.clone();
        let experience = request.experience;
        self.emit(Event::CatchStarted {
            names: names.clone(),
            experience,
            at: Utc::now(),
        });
        let task = tokio::spawn(async move { hooks.save_caught_items(names, experience).await });
        self.pending = Some(PendingCatch { request, task });
    }

    fn finish_catch(&mut self, result: Result<(), PersistenceError>) {
        let Some(pending) = self.pending.take() else {
            tracing::error!(session = %self.id, "save result arrived with nothing pending");
            return;
        };
        let request = pending.request;
        if result.is_ok() {
            self.summary.caught.extend(request.names.iter().cloned());
            self.summary.experience_earned += u64::from(request.experience);
        }
        match self.reconciler.finish_confirm(&request, result) {
            CatchOutcome::Caught { indices } => {
                tracing::info!(session = %self.id, names = ?request.names, "caught");
                self.emit(Event::CatchConfirmed {
                    indices,
                    names: request.names,
                    experience: request.experience,
                    at: Utc::now(),
                });
            }
            CatchOutcome::Failed { message } => {
                tracing::warn!(session = %self.id, "saving caught items failed: {message}");
                self.emit(Event::CatchFailed {
                    message,
                    retryable: true,
                    at: Utc::now(),
                });
            }
            CatchOutcome::Stale => {
                tracing::debug!(
                    session = %self.id,
                    batch = request.batch_id,
                    "save finished after its batch was replaced"
                );
            }
        }
        self.publish();
    }

    /// Exit the session. `navigate` is false when the owner simply dropped
    /// every handle, since it has already gone elsewhere.
    fn close(&mut self, by_user: bool, navigate: bool) {
        self.engine.end();
        let completed_repetitions = self.engine.state().completed_repetitions;
        self.summary.ended_by_user = by_user;
        let event = if by_user {
            if !self.reconciler.selected().is_empty() {
                tracing::debug!(session = %self.id, "abandoning unsaved selection");
            }
            Event::SessionEnded {
                completed_repetitions,
                at: Utc::now(),
            }
        } else {
            Event::SessionFinished {
                completed_repetitions,
                at: Utc::now(),
            }
        };
        tracing::info!(session = %self.id, by_user, completed_repetitions, "session closed");
        self.emit(event);
        self.publish();
        if navigate || !by_user {
            self.hooks.navigate_to(Screen::MainMenu);
        }
    }

    fn new_clock(&self) -> Interval {
        let mut clock = tokio::time::interval_at(Instant::now() + self.tick_period, self.tick_period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        clock
    }

    fn emit_phase_started(&self) {
        self.emit(Event::PhaseStarted {
            stage: self.engine.stage(),
            duration_secs: self.engine.total_secs(),
            at: Utc::now(),
        });
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.snapshot
            .send_replace(build_snapshot(self.id, &self.engine, &self.reconciler, &self.batch));
    }
}

fn build_snapshot(
    id: Uuid,
    engine: &SessionEngine,
    reconciler: &CatchReconciler,
    batch: &EncounterBatch,
) -> SessionSnapshot {
    let config = engine.config();
    SessionSnapshot {
        session_id: id,
        label: config.label.clone(),
        category: config.category,
        repetition_count: config.repetition_count,
        stage: engine.stage(),
        state: engine.state().clone(),
        total_secs: engine.total_secs(),
        phase_progress: engine.phase_progress(),
        encounters: batch.clone(),
        capacity: reconciler.capacity(),
        selected: reconciler.selected().iter().copied().collect(),
        caught: reconciler.caught().iter().copied().collect(),
        saving: reconciler.is_saving(),
    }
}

async fn wait_pending(pending: &mut Option<PendingCatch>) -> Result<(), PersistenceError> {
    match pending {
        Some(p) => match (&mut p.task).await {
            Ok(result) => result,
            Err(e) => Err(PersistenceError::Aborted(e.to_string())),
        },
        None => std::future::pending().await,
    }
}

/// Cloneable command sender for a running session.
#[derive(Debug, Clone)]
pub struct SessionCommander {
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionCommander {
    /// # Errors
    ///
    /// Returns `CoreError::SessionClosed` once the session has exited.
    pub fn send(&self, cmd: Command) -> Result<(), CoreError> {
        self.tx.send(cmd).map_err(|_| CoreError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owner's handle on a spawned session.
///
/// Dropping the handle and every [`SessionCommander`] tears the session
/// down, the same as navigating away.
pub struct SessionHandle {
    id: Uuid,
    commander: SessionCommander,
    events: broadcast::Sender<Event>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn commander(&self) -> SessionCommander {
        self.commander.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// # Errors
    ///
    /// Returns `CoreError::SessionClosed` once the session has exited.
    pub fn send(&self, cmd: Command) -> Result<(), CoreError> {
        self.commander.send(cmd)
    }

    pub fn pause(&self) -> Result<(), CoreError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), CoreError> {
        self.send(Command::Resume)
    }

    pub fn toggle_pause(&self) -> Result<(), CoreError> {
        self.send(Command::TogglePause)
    }

    pub fn skip(&self) -> Result<(), CoreError> {
        self.send(Command::Skip)
    }

    pub fn toggle_selection(&self, index: usize) -> Result<(), CoreError> {
        self.send(Command::ToggleSelection(index))
    }

    pub fn confirm_catch(&self) -> Result<(), CoreError> {
        self.send(Command::ConfirmCatch)
    }

    pub fn gesture(&self, kind: GestureKind) -> Result<(), CoreError> {
        self.send(Command::Gesture(kind))
    }

    pub fn end(&self) -> Result<(), CoreError> {
        self.send(Command::End)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to exit.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Custom` if the session task panicked.
    pub async fn join(self) -> Result<SessionSummary, CoreError> {
        let SessionHandle { commander, task, .. } = self;
        // Keep commands open until the session itself exits.
        let summary = task
            .await
            .map_err(|e| CoreError::Custom(format!("session task failed: {e}")))?;
        drop(commander);
        Ok(summary)
    }
}
