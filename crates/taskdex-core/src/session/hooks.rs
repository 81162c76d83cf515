use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::encounter::Category;
use crate::error::{HookError, PersistenceError};

/// Where a session hands control when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    MainMenu,
}

/// External collaborators of a running session.
///
/// `on_work_session_complete` and `navigate_to` are fire-and-forget:
/// their failures are logged and never hold up a transition.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Called once per finished work phase, after the break's encounters
    /// have been generated.
    fn on_work_session_complete(
        &self,
        _duration_minutes: u32,
        _category: Category,
        _success: bool,
    ) -> Result<(), HookError> {
        Ok(()) // default no-op
    }

    /// Persist a confirmed catch. The session waits for this before the
    /// user may select again.
    async fn save_caught_items(
        &self,
        names: Vec<String>,
        experience: u32,
    ) -> Result<(), PersistenceError>;

    /// Terminal exit when the session finishes or the user ends it.
    fn navigate_to(&self, _screen: Screen) {}
}
