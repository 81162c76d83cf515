//! # TaskDex Core Library
//!
//! Core logic for TaskDex, a Pomodoro timer that rewards finished work
//! phases with wild creature encounters. Every operation is available to
//! the standalone `taskdex` CLI; front ends stay thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A tick-driven work/break state machine. The engine is
//!   pure; the caller drives it once per second and acts on the
//!   [`Transition`]s it returns
//! - **Encounters**: Batch generation at each work→break transition, drawn
//!   from a seeded [`WildPool`]
//! - **Catch Reconciler**: Selection limits and a single-flight catch save
//! - **Audio Gate**: Lazy, memoized cue loading that only plays once a user
//!   gesture has been seen
//! - **Session Runner**: An async task that owns the engine and turns
//!   transitions into events, hook calls and audio cues
//! - **Storage**: SQLite collection log and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Core session state machine
//! - [`SessionRunner`]: Async driver with a command/event interface
//! - [`CatchReconciler`]: Selection and catch confirmation
//! - [`AudioGate`]: Cue loading, unlock and playback
//! - [`Database`]: Caught collection and work history
//! - [`Config`]: Application configuration management

pub mod audio;
pub mod catch;
pub mod encounter;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use audio::{AudioAsset, AudioBackend, AudioGate, AudioSettings, BellBackend, GestureKind};
pub use catch::{catch_capacity, CatchOutcome, CatchReconciler, CatchRequest};
pub use encounter::{
    generate_encounters, Category, EncounterBatch, EncounterItem, ItemSource, WildPool,
};
pub use error::{
    AudioError, ConfigError, CoreError, DatabaseError, HookError, PersistenceError,
    ValidationError,
};
pub use events::Event;
pub use session::{
    Command, Screen, SessionCommander, SessionHandle, SessionHooks, SessionRunner,
    SessionSnapshot, SessionSummary,
};
pub use storage::{CaughtRecord, CollectionStats, Config, Database};
pub use timer::{Phase, SessionConfig, SessionEngine, SessionState, Stage, Transition};
