use clap::Subcommand;
use pomosync_core::{Config, Database, Theme};

use super::{print_json, timer, CmdResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Dotted key (e.g. "theme", "timer.work_duration")
        key: String,
    },
    /// Set a config value
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults, keeping the cloud endpoint
    Reset,
    /// Set the theme: light, dark or system
    Theme { theme: Theme },
    /// Toggle completion notifications
    Notifications,
    /// Toggle the completion bell
    Mute,
}

/// Carry new timer settings over to the persisted timer. Only an idle,
/// untouched session changes length.
fn retime(previous: &Config, current: &Config) -> CmdResult {
    if previous.timer == current.timer {
        return Ok(());
    }
    let db = Database::open()?;
    let timer::Loaded {
        timer: mut t,
        stored,
        ..
    } = timer::load(&db, previous)?;
    t.apply_settings(current.timer);
    timer::commit(&db, stored.as_ref(), &t)?;
    Ok(())
}

pub fn run(action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let previous = Config::load()?;
            let mut config = previous.clone();
            config.set(&key, &value)?;
            config.save()?;
            retime(&previous, &config)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            print_json(&config)?;
        }
        ConfigAction::Reset => {
            let previous = Config::load()?;
            let mut config = previous.clone();
            config.reset();
            config.save()?;
            retime(&previous, &config)?;
            println!("config reset to defaults");
        }
        ConfigAction::Theme { theme } => {
            let mut config = Config::load()?;
            config.set_theme(theme);
            config.save()?;
            println!("{}", config.get("theme").unwrap_or_default());
        }
        ConfigAction::Notifications => {
            let mut config = Config::load()?;
            let enabled = config.toggle_notifications();
            config.save()?;
            println!("notifications {}", if enabled { "on" } else { "off" });
        }
        ConfigAction::Mute => {
            let mut config = Config::load()?;
            let muted = config.toggle_muted();
            config.save()?;
            println!("{}", if muted { "muted" } else { "unmuted" });
        }
    }
    Ok(())
}
