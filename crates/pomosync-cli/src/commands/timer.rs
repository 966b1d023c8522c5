use std::io::Write;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use clap::Subcommand;
use pomosync_core::cloud::save_session_to_cloud;
use pomosync_core::{
    format_time, Config, CoreError, Database, Event, Notifier, PomodoroTimer, SessionRecord,
    StorageError, TerminalNotifier, TimerSnapshot, TimerState,
};
use tracing::{info, warn};

use super::{print_json, runtime, signed_in, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session, or continue a paused one
    Start,
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Pause when running, otherwise start or resume
    Toggle,
    /// Restart the current session from its full duration
    Reset,
    /// Jump to the next session
    Skip,
    /// Print current timer state as JSON
    Status,
    /// Show a live countdown until the running session ends
    Watch,
}

/// Persisted timer as of this command.
pub struct Loaded {
    pub timer: PomodoroTimer,
    /// What the database holds; later writes are checked against it.
    pub stored: Option<TimerSnapshot>,
    /// Completion that happened while nothing was running, already recorded.
    pub settled: Option<Event>,
}

/// Load the persisted timer, settling any session that finished while
/// nothing was running.
///
/// Only the process that moves the stored timer past its deadline records
/// the completion; a loser of that race reloads the winner's state.
pub fn load(db: &Database, config: &Config) -> Result<Loaded, Box<dyn std::error::Error>> {
    loop {
        let Some(snapshot) = db.load_timer()? else {
            return Ok(Loaded {
                timer: PomodoroTimer::new(config.timer),
                stored: None,
                settled: None,
            });
        };
        let (timer, missed) = PomodoroTimer::restore(config.timer, snapshot.clone());
        let Some(event) = missed else {
            return Ok(Loaded {
                timer,
                stored: Some(snapshot),
                settled: None,
            });
        };
        let next = timer.snapshot();
        if db.replace_timer(Some(&snapshot), &next)? {
            settle(db, config, &event)?;
            return Ok(Loaded {
                timer,
                stored: Some(next),
                settled: Some(event),
            });
        }
    }
}

/// Write the timer back unless someone else changed it since `stored`.
pub fn commit(
    db: &Database,
    stored: Option<&TimerSnapshot>,
    timer: &PomodoroTimer,
) -> Result<(), CoreError> {
    if db.replace_timer(stored, &timer.snapshot())? {
        Ok(())
    } else {
        Err(StorageError::TimerChanged.into())
    }
}

/// Record a completed session, notify, and upload it. The timer must
/// already be saved past the completion.
fn settle(db: &Database, config: &Config, event: &Event) -> CmdResult {
    let Event::SessionCompleted {
        kind,
        started_at,
        ended_at,
        ..
    } = event
    else {
        return Ok(());
    };
    let started_at = started_at.unwrap_or_else(|| {
        *ended_at - ChronoDuration::seconds(config.timer.duration_secs(*kind) as i64)
    });
    let id = db.record_session(*kind, started_at, *ended_at, None)?;
    info!(id, kind = kind.as_str(), "session recorded");
    TerminalNotifier::stderr(config).session_finished(*kind)?;

    let record = SessionRecord {
        id,
        kind: *kind,
        started_at,
        ended_at: *ended_at,
        task_id: None,
        synced: false,
    };
    upload(db, config, &record);
    Ok(())
}

/// Best effort: the session stays unsynced locally if this fails.
fn upload(db: &Database, config: &Config, record: &SessionRecord) {
    if config.cloud.endpoint().is_err() {
        return;
    }
    let result = match runtime() {
        Ok(rt) => rt.block_on(upload_session(db, config, record)),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to save session to cloud");
    }
}

async fn upload_session(
    db: &Database,
    config: &Config,
    record: &SessionRecord,
) -> Result<(), CoreError> {
    if let Some((client, session)) = signed_in(config).await? {
        save_session_to_cloud(&client, &session, db, record).await?;
    }
    Ok(())
}

/// Countdown driven by the persisted timer, so commands from other
/// terminals take effect. Ends once the timer is no longer running.
fn watch(db: &Database, config: &Config) -> CmdResult {
    let mut timer = load(db, config)?.timer;
    let mut stdout = std::io::stdout();
    while timer.state() == TimerState::Running {
        print!(
            "\r{} {} ",
            timer.kind().label(),
            format_time(timer.time_left_secs())
        );
        stdout.flush()?;
        std::thread::sleep(Duration::from_secs(1));

        let loaded = load(db, config)?;
        if let Some(event) = &loaded.settled {
            println!();
            print_json(event)?;
        }
        timer = loaded.timer;
    }
    println!();
    print_json(&timer.status())
}

pub fn run(action: TimerAction) -> CmdResult {
    let config = Config::load()?;
    let db = Database::open()?;
    if let TimerAction::Watch = action {
        return watch(&db, &config);
    }
    let Loaded {
        mut timer, stored, ..
    } = load(&db, &config)?;

    let event = match action {
        TimerAction::Start => timer.start(),
        TimerAction::Pause => timer.pause(),
        TimerAction::Resume => timer.resume(),
        TimerAction::Toggle => timer.toggle(),
        TimerAction::Reset => timer.reset(),
        TimerAction::Skip => timer.skip(),
        TimerAction::Status | TimerAction::Watch => None,
    };

    commit(&db, stored.as_ref(), &timer)?;
    match event {
        Some(event) => {
            print_json(&event)?;
            settle(&db, &config, &event)
        }
        // No-op commands still report where the timer stands.
        None => print_json(&timer.status()),
    }
}
