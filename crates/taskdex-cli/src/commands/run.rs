//! Interactive session driven from stdin.
//!
//! Each input line is one command:
//!
//! | input | command                                   |
//! |-------|-------------------------------------------|
//! | `p`   | pause / resume                            |
//! | `s`   | skip the current phase                    |
//! | `1`.. | toggle that encounter (numbered as shown) |
//! | `c`   | confirm catch                             |
//! | `q`   | end the session                           |

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use taskdex_core::{
    AudioGate, BellBackend, Category, Command, Config, CoreError, Database, Event, GestureKind,
    HookError, PersistenceError, Screen, SessionConfig, SessionHooks, SessionRunner,
    SessionSummary, Stage, WildPool,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Args)]
pub struct RunArgs {
    /// Work phase length in minutes
    #[arg(long)]
    work: Option<u32>,
    /// Break phase length in minutes
    #[arg(long = "break")]
    break_minutes: Option<u32>,
    /// Number of work/break repetitions
    #[arg(long)]
    reps: Option<u32>,
    /// Session label
    #[arg(long)]
    label: Option<String>,
    /// Creature category
    #[arg(long)]
    category: Option<Category>,
    /// Seed for reproducible encounters
    #[arg(long)]
    seed: Option<u64>,
    /// Clock period in milliseconds (1000 is real time)
    #[arg(long)]
    tick_ms: Option<u64>,
    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn session_config(&self, config: &Config) -> SessionConfig {
        let mut session = config.session_config();
        if let Some(work) = self.work {
            session.work_minutes = work;
        }
        if let Some(break_minutes) = self.break_minutes {
            session.break_minutes = break_minutes;
        }
        if let Some(reps) = self.reps {
            session.repetition_count = reps;
        }
        if let Some(label) = &self.label {
            session.label = label.clone();
        }
        if let Some(category) = self.category {
            session.category = category;
        }
        session
    }

    fn wild_pool(&self, config: &Config) -> WildPool {
        match self.seed {
            Some(seed) => WildPool::seeded(seed)
                .with_off_category_chance(config.encounters.off_category_chance),
            None => config.wild_pool(),
        }
    }
}

/// Writes catches and finished work phases to the local collection.
struct CollectionHooks {
    db: Mutex<Database>,
    json: bool,
}

#[async_trait]
impl SessionHooks for CollectionHooks {
    fn on_work_session_complete(
        &self,
        duration_minutes: u32,
        category: Category,
        success: bool,
    ) -> Result<(), HookError> {
        let hook = "on_work_session_complete";
        let db = self
            .db
            .lock()
            .map_err(|_| HookError::new(hook, "collection lock poisoned"))?;
        db.record_work_session(duration_minutes, category, success)
            .map_err(|e| HookError::new(hook, e.to_string()))?;
        Ok(())
    }

    async fn save_caught_items(
        &self,
        names: Vec<String>,
        experience: u32,
    ) -> Result<(), PersistenceError> {
        let db = self
            .db
            .lock()
            .map_err(|_| PersistenceError::SaveFailed("collection lock poisoned".into()))?;
        db.record_caught(&names, experience)?;
        Ok(())
    }

    fn navigate_to(&self, screen: Screen) {
        tracing::debug!(?screen, "navigate");
        if !self.json {
            println!("Returning to the main menu.");
        }
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let session = args.session_config(&config);
    if let Err(e) = session.validate() {
        tracing::warn!("running anyway: {e}");
    }
    let tick_period = Duration::from_millis(args.tick_ms.unwrap_or(config.session.tick_period_ms));

    let hooks = Arc::new(CollectionHooks {
        db: Mutex::new(Database::open()?),
        json: args.json,
    });
    let audio = Arc::new(AudioGate::new(
        config.audio_settings(),
        Arc::new(BellBackend::stderr()),
    ));
    let json = args.json;
    let pool = args.wild_pool(&config);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = rt.block_on(async move {
        let runner =
            SessionRunner::new(session, Box::new(pool), hooks, audio).with_tick_period(tick_period);
        drive(runner, json).await
    });
    // The stdin reader may still be parked in a blocking read.
    rt.shutdown_background();

    let summary = result?;
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn drive(runner: SessionRunner, json: bool) -> Result<SessionSummary, CoreError> {
    let mut events = runner.subscribe();
    let handle = runner.spawn();
    let commander = handle.commander();

    let input = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(cmd) = parse_line(&line) else {
                if !line.trim().is_empty() {
                    eprintln!("commands: p (pause/resume), s (skip), 1-9 (select), c (catch), q (quit)");
                }
                continue;
            };
            // Any typed command is a user gesture.
            if commander.send(Command::Gesture(GestureKind::KeyDown)).is_err()
                || commander.send(cmd).is_err()
            {
                break;
            }
        }
    });

    loop {
        match events.recv().await {
            Ok(event) => {
                print_event(&event, json);
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => tracing::warn!("skipped {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
    input.abort();
    handle.join().await
}

/// Selection numbers are 1-based on screen.
fn parse_line(line: &str) -> Option<Command> {
    match line.trim() {
        "p" | "pause" => Some(Command::TogglePause),
        "s" | "skip" => Some(Command::Skip),
        "c" | "catch" => Some(Command::ConfirmCatch),
        "q" | "quit" => Some(Command::End),
        other => match other.parse::<usize>() {
            Ok(n) if n > 0 => Some(Command::ToggleSelection(n - 1)),
            _ => None,
        },
    }
}

fn clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn print_event(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("cannot encode event: {e}"),
        }
        return;
    }

    match event {
        Event::SessionStarted { config, .. } => println!(
            "{}: {} x {}m work / {}m break, {} encounters",
            config.label,
            config.repetition_count,
            config.work_minutes,
            config.break_minutes,
            config.category
        ),
        Event::PhaseStarted {
            stage,
            duration_secs,
            ..
        } => match stage {
            Stage::Work(n) => println!("Work {n} started ({})", clock(*duration_secs)),
            Stage::Break(n) => println!("Break {n} started ({})", clock(*duration_secs)),
            Stage::Finished => {}
        },
        Event::TimerPaused {
            seconds_remaining, ..
        } => println!("Paused with {} left", clock(*seconds_remaining)),
        Event::TimerResumed {
            seconds_remaining, ..
        } => println!("Resumed with {} left", clock(*seconds_remaining)),
        Event::WorkCompleted {
            repetition,
            skipped,
            ..
        } => println!(
            "Work {repetition} complete{}",
            if *skipped { " (skipped)" } else { "" }
        ),
        Event::EncountersSpawned {
            batch, capacity, ..
        } => {
            if batch.is_empty() {
                println!("No wild encounters this time.");
            } else {
                println!(
                    "Wild encounters! Pick up to {capacity} for +{} exp:",
                    batch.experience
                );
                for (i, item) in batch.items.iter().enumerate() {
                    println!("  [{}] {} ({})", i + 1, item.name, item.category);
                }
            }
        }
        Event::BreakCompleted {
            repetition,
            skipped,
            ..
        } => println!(
            "Break {repetition} over{}",
            if *skipped { " (skipped)" } else { "" }
        ),
        Event::SelectionChanged { selected, .. } => {
            let shown: Vec<String> = selected.iter().map(|i| (i + 1).to_string()).collect();
            println!("Selected: {}", shown.join(", "));
        }
        Event::CatchStarted { names, .. } => println!("Throwing at {}...", names.join(", ")),
        Event::CatchConfirmed {
            names, experience, ..
        } => println!("Caught {}! +{experience} exp", names.join(", ")),
        Event::CatchFailed { message, .. } => {
            println!("Catch failed: {message}. Press c to try again.")
        }
        Event::SessionFinished {
            completed_repetitions,
            ..
        } => println!("Session finished after {completed_repetitions} repetitions."),
        Event::SessionEnded {
            completed_repetitions,
            ..
        } => println!("Session ended after {completed_repetitions} repetitions."),
    }
}

fn print_summary(summary: &SessionSummary) {
    if summary.caught.is_empty() {
        println!("Nothing caught this session.");
    } else {
        println!(
            "Caught this session: {} (+{} exp)",
            summary.caught.join(", "),
            summary.experience_earned
        );
    }
}
