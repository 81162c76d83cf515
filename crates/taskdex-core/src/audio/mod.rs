//! Audio gate: lazily loaded sound cues behind a user-gesture unlock.
//!
//! Each [`AudioAsset`] is loaded at most once per gate. Loading never
//! fails: a failed fetch falls back to streaming from the URL, and a
//! disabled or unusable asset yields a silent handle. Playback before the
//! first user gesture may be refused by the backend; refusals are logged
//! and swallowed.
//!
//! The gate is shared as `Arc<AudioGate>` between the session runner and
//! whatever front end reports gestures.

mod backend;

pub use backend::{AudioAsset, AudioBackend, AudioSource, BellBackend, PlayRequest};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use crate::error::AudioError;

pub const DEFAULT_SPAWN_URL: &str =
    "https://raw.githubusercontent.com/wrish6/prototype/main/pokemon_center_heal.mp3";
pub const DEFAULT_CAUGHT_URL: &str =
    "https://raw.githubusercontent.com/wrish6/prototype/main/06-caught-a-pokemon.mp3";

/// Kinds of input that count as a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    PointerDown,
    KeyDown,
    Click,
    /// Pressing skip is itself a gesture.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub enabled: bool,
    pub volume: f32,
    pub spawn_url: String,
    pub caught_url: String,
}

impl AudioSettings {
    fn url_for(&self, asset: AudioAsset) -> &str {
        match asset {
            AudioAsset::Spawn => &self.spawn_url,
            AudioAsset::Caught => &self.caught_url,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.9,
            spawn_url: DEFAULT_SPAWN_URL.into(),
            caught_url: DEFAULT_CAUGHT_URL.into(),
        }
    }
}

/// A loaded (or silently unusable) sound cue.
#[derive(Debug)]
pub struct AudioHandle {
    asset: AudioAsset,
    source: Option<AudioSource>,
    unlocked: AtomicBool,
}

impl AudioHandle {
    fn new(asset: AudioAsset, source: Option<AudioSource>) -> Self {
        Self {
            asset,
            source,
            unlocked: AtomicBool::new(false),
        }
    }

    pub fn asset(&self) -> AudioAsset {
        self.asset
    }

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    /// False for disabled assets and unparseable URLs.
    pub fn is_functional(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }
}

pub struct AudioGate {
    settings: AudioSettings,
    backend: Arc<dyn AudioBackend>,
    client: reqwest::Client,
    spawn: OnceCell<Arc<AudioHandle>>,
    caught: OnceCell<Arc<AudioHandle>>,
    gesture_received: AtomicBool,
    listener_armed: AtomicBool,
}

impl AudioGate {
    pub fn new(settings: AudioSettings, backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            settings,
            backend,
            client: reqwest::Client::new(),
            spawn: OnceCell::new(),
            caught: OnceCell::new(),
            gesture_received: AtomicBool::new(false),
            listener_armed: AtomicBool::new(true),
        }
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    fn cell(&self, asset: AudioAsset) -> &OnceCell<Arc<AudioHandle>> {
        match asset {
            AudioAsset::Spawn => &self.spawn,
            AudioAsset::Caught => &self.caught,
        }
    }

    /// Load `asset` once; every caller shares the same load.
    pub async fn ensure_loaded(&self, asset: AudioAsset) -> Arc<AudioHandle> {
        self.cell(asset)
            .get_or_init(|| async { Arc::new(self.load(asset).await) })
            .await
            .clone()
    }

    /// Start loading both cues without playing anything.
    pub async fn preload(&self) {
        tokio::join!(
            self.ensure_loaded(AudioAsset::Spawn),
            self.ensure_loaded(AudioAsset::Caught)
        );
    }

    pub fn is_loaded(&self, asset: AudioAsset) -> bool {
        self.cell(asset).initialized()
    }

    pub fn gesture_received(&self) -> bool {
        self.gesture_received.load(Ordering::SeqCst)
    }

    /// Record a user gesture. Returns true only for the first one, which
    /// is the caller's cue to unlock both assets.
    pub fn mark_gesture(&self, kind: GestureKind) -> bool {
        self.gesture_received.store(true, Ordering::SeqCst);
        let first = self.listener_armed.swap(false, Ordering::SeqCst);
        if first {
            tracing::debug!(?kind, "first user gesture, audio unlocked");
        }
        first
    }

    /// One-shot gesture listener: the first gesture unlocks both cues,
    /// later gestures do nothing.
    pub async fn on_gesture(&self, kind: GestureKind) {
        if self.mark_gesture(kind) {
            self.unlock_all().await;
        }
    }

    pub async fn unlock_all(&self) {
        tokio::join!(
            self.unlock(AudioAsset::Spawn),
            self.unlock(AudioAsset::Caught)
        );
    }

    /// Muted zero-length playback so later audible playback is allowed.
    ///
    /// Only takes effect once a gesture has been received. Idempotent.
    pub async fn unlock(&self, asset: AudioAsset) {
        let handle = self.ensure_loaded(asset).await;
        let Some(source) = handle.source() else {
            return;
        };
        if handle.is_unlocked() || !self.gesture_received() {
            return;
        }
        let request = PlayRequest {
            asset,
            source,
            muted: true,
            volume: 0.0,
            gesture_granted: true,
        };
        if let Err(e) = self.backend.play(&request) {
            tracing::debug!(asset = asset.as_str(), "unlock attempt failed: {e}");
            return;
        }
        handle.unlocked.store(true, Ordering::SeqCst);
        tracing::debug!(asset = asset.as_str(), "unlock attempt finished");
    }

    /// Play `asset` from the start. Never fails; rejections are logged.
    pub async fn play(&self, asset: AudioAsset) {
        let handle = self.ensure_loaded(asset).await;
        let Some(source) = handle.source() else {
            tracing::debug!(asset = asset.as_str(), "no audio instance, skipping cue");
            return;
        };
        let request = PlayRequest {
            asset,
            source,
            muted: false,
            volume: self.settings.volume,
            gesture_granted: handle.is_unlocked() || self.gesture_received(),
        };
        match self.backend.play(&request) {
            Ok(()) => tracing::debug!(asset = asset.as_str(), "playing cue"),
            Err(e) => tracing::warn!(asset = asset.as_str(), "play rejected: {e}"),
        }
    }

    async fn load(&self, asset: AudioAsset) -> AudioHandle {
        if !self.settings.enabled {
            return AudioHandle::new(asset, None);
        }
        let raw = self.settings.url_for(asset).trim();
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(asset = asset.as_str(), "unusable audio url '{raw}': {e}");
                return AudioHandle::new(asset, None);
            }
        };
        tracing::debug!(asset = asset.as_str(), %url, "loading cue");
        let source = match fetch(&self.client, &url).await {
            Ok(bytes) => AudioSource::Buffer(bytes),
            Err(e) => {
                tracing::warn!(
                    asset = asset.as_str(),
                    "pre-fetch failed, falling back to streaming: {e}"
                );
                AudioSource::Stream(url)
            }
        };
        AudioHandle::new(asset, Some(source))
    }
}

async fn fetch(client: &reqwest::Client, url: &Url) -> Result<Arc<[u8]>, AudioError> {
    let fail = |message: String| AudioError::FetchFailed {
        url: url.to_string(),
        message,
    };
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }
    let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;
    Ok(Arc::from(bytes.as_ref()))
}
