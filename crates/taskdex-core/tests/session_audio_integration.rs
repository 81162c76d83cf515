//! Integration tests for the cues a running session plays.
//!
//! Audio URLs point at a closed loopback port, so every load takes the
//! streaming fallback without touching the network. These run on the real
//! clock because the refused connections are real IO.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use taskdex_core::audio::{AudioSettings, AudioSource, PlayRequest};
use taskdex_core::{
    AudioAsset, AudioBackend, AudioError, AudioGate, Category, Event, HookError,
    PersistenceError, SessionConfig, SessionHandle, SessionHooks, SessionRunner, Stage, WildPool,
};
use tokio::sync::broadcast;

/// One ordered log shared by the hooks and the audio backend.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Audible requests only, in order: `play:<asset>` or `rejected:<asset>`.
    fn audible(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with("play:") || e.starts_with("rejected:"))
            .collect()
    }
}

struct JournalBackend(Journal);

impl AudioBackend for JournalBackend {
    fn play(&self, request: &PlayRequest<'_>) -> Result<(), AudioError> {
        let asset = request.asset.as_str();
        if request.muted {
            self.0.push(format!("unlock:{asset}"));
            return Ok(());
        }
        if !request.gesture_granted {
            self.0.push(format!("rejected:{asset}"));
            return Err(AudioError::PlaybackRejected("no user gesture".into()));
        }
        self.0.push(format!("play:{asset}"));
        Ok(())
    }
}

struct JournalHooks(Journal);

#[async_trait]
impl SessionHooks for JournalHooks {
    fn on_work_session_complete(
        &self,
        duration_minutes: u32,
        _category: Category,
        _success: bool,
    ) -> Result<(), HookError> {
        self.0.push(format!("hook:{duration_minutes}"));
        Ok(())
    }

    async fn save_caught_items(
        &self,
        _names: Vec<String>,
        _experience: u32,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
}

fn start(
    config: SessionConfig,
    journal: &Journal,
    tick: Duration,
) -> (SessionHandle, broadcast::Receiver<Event>, Arc<AudioGate>) {
    let settings = AudioSettings {
        spawn_url: "http://127.0.0.1:1/spawn.mp3".into(),
        caught_url: "http://127.0.0.1:1/caught.mp3".into(),
        ..AudioSettings::default()
    };
    let audio = Arc::new(AudioGate::new(
        settings,
        Arc::new(JournalBackend(journal.clone())),
    ));
    let runner = SessionRunner::new(
        config,
        Box::new(WildPool::seeded(11)),
        Arc::new(JournalHooks(journal.clone())),
        audio.clone(),
    )
    .with_tick_period(tick);
    let events = runner.subscribe();
    (runner.spawn(), events, audio)
}

async fn next_matching(
    events: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = events.recv().await.expect("event stream closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Poll until the journal satisfies `pred`.
async fn settle(journal: &Journal, pred: impl Fn(&[String]) -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !pred(&journal.entries()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("cues never arrived, journal: {:?}", journal.entries()));
}

fn position(entries: &[String], entry: &str) -> usize {
    entries
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{entry} missing from {entries:?}"))
}

#[tokio::test]
async fn skipped_phases_play_cues_after_the_hook() {
    let journal = Journal::default();
    let (handle, mut events, audio) =
        start(SessionConfig::new(30, 5, 2), &journal, Duration::from_secs(1));

    handle.skip().unwrap();
    settle(&journal, |_| journal.audible().len() >= 2).await;
    assert_eq!(journal.audible(), vec!["play:spawn", "play:caught"]);

    // Completion hook first, then each cue is unlocked before it plays.
    let entries = journal.entries();
    let hook = position(&entries, "hook:30");
    assert!(hook < position(&entries, "unlock:spawn"));
    assert!(position(&entries, "unlock:spawn") < position(&entries, "play:spawn"));
    assert!(position(&entries, "play:spawn") < position(&entries, "play:caught"));
    assert!(position(&entries, "unlock:caught") < position(&entries, "play:caught"));

    // Both cues stream from their URL after the refused pre-fetch.
    for asset in [AudioAsset::Spawn, AudioAsset::Caught] {
        let loaded = audio.ensure_loaded(asset).await;
        assert!(matches!(loaded.source(), Some(AudioSource::Stream(_))));
    }

    // Skipping the break plays the spawn cue once more.
    handle.skip().unwrap();
    next_matching(&mut events, |e| {
        matches!(e, Event::PhaseStarted { stage: Stage::Work(2), .. })
    })
    .await;
    settle(&journal, |_| journal.audible().len() >= 3).await;
    assert_eq!(journal.audible(), vec!["play:spawn", "play:caught", "play:spawn"]);

    handle.end().unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn timed_out_work_without_gesture_is_rejected_and_advances() {
    let journal = Journal::default();
    let (handle, mut events, _audio) =
        start(SessionConfig::new(1, 1, 2), &journal, Duration::from_millis(2));

    next_matching(&mut events, |e| {
        matches!(e, Event::PhaseStarted { stage: Stage::Break(1), .. })
    })
    .await;
    settle(&journal, |_| journal.audible().len() >= 2).await;

    let audible = journal.audible();
    assert_eq!(audible[..2], ["rejected:spawn", "rejected:caught"]);
    // Unlock needs a gesture, so nothing was unlocked.
    assert!(!journal.entries().iter().any(|e| e.starts_with("unlock:")));
    let entries = journal.entries();
    assert!(position(&entries, "hook:1") < position(&entries, "rejected:spawn"));

    handle.end().unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn final_work_phase_plays_spawn_only() {
    let journal = Journal::default();
    let (handle, mut events, _audio) =
        start(SessionConfig::new(30, 5, 0), &journal, Duration::from_secs(1));

    handle.skip().unwrap();
    let closed = next_matching(&mut events, Event::is_terminal).await;
    assert!(matches!(closed, Event::SessionFinished { .. }));
    handle.join().await.unwrap();

    // Skip is the first gesture, so both cues get unlocked even though
    // only the spawn cue plays.
    settle(&journal, |entries| {
        entries.iter().any(|e| e == "play:spawn") && entries.iter().any(|e| e == "unlock:caught")
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(journal.audible(), vec!["play:spawn"]);
}
