mod config;
mod engine;

pub use config::{Phase, SessionConfig, Stage};
pub use engine::{SessionEngine, SessionState, Transition};
