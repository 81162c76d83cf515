use std::io::Write;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AudioError;

/// The two sound cues a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioAsset {
    /// Played when a work phase ends and encounters appear.
    Spawn,
    /// Played right after the spawn cue, within the same transition.
    Caught,
}

impl AudioAsset {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioAsset::Spawn => "spawn",
            AudioAsset::Caught => "caught",
        }
    }
}

/// Where a loaded asset's samples come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Fully pre-fetched bytes.
    Buffer(std::sync::Arc<[u8]>),
    /// Fetch failed; the backend streams from the URL itself.
    Stream(Url),
}

/// One playback request. Playback always starts from position zero.
#[derive(Debug, Clone)]
pub struct PlayRequest<'a> {
    pub asset: AudioAsset,
    pub source: &'a AudioSource,
    pub muted: bool,
    pub volume: f32,
    /// Whether a user gesture has unlocked audio yet.
    pub gesture_granted: bool,
}

/// Output device seam.
///
/// Backends may refuse unmuted playback before a gesture, the same way a
/// browser refuses autoplay. The gate logs and drops any error.
pub trait AudioBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `AudioError::PlaybackRejected` when the request is refused.
    fn play(&self, request: &PlayRequest<'_>) -> Result<(), AudioError>;
}

/// Terminal backend: rings the bell for every audible cue.
pub struct BellBackend {
    out: Mutex<Box<dyn Write + Send>>,
}

impl BellBackend {
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl AudioBackend for BellBackend {
    fn play(&self, request: &PlayRequest<'_>) -> Result<(), AudioError> {
        if request.muted {
            return Ok(());
        }
        if !request.gesture_granted {
            return Err(AudioError::PlaybackRejected(format!(
                "{} cue needs a user gesture first",
                request.asset.as_str()
            )));
        }
        if request.volume <= 0.0 {
            return Ok(());
        }
        let mut out = self
            .out
            .lock()
            .map_err(|_| AudioError::PlaybackRejected("output lock poisoned".into()))?;
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }
}
