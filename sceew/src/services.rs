//! Side-effecting collaborators the engine drives but does not own.
//!
//! Rendering, audio playback, window management and OS notifications live
//! outside the core. The engine only talks to them through the traits below,
//! all of which are fire-and-forget from its point of view. The console and
//! log-backed implementations let the daemon and the shell run headless.

use colored::Colorize;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::config::ObserverConfig;
use crate::error::{Result, SceewError};
use crate::estimate::SoundLevel;

/// The panels the engine writes text into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayField {
    /// S-wave countdown / "already arrived" line.
    Countdown,
    /// Local intensity advice.
    Tips,
    /// Hypocenter name and distance.
    Epicenter,
    /// Magnitude and maximum reported intensity.
    Magnitude,
    /// Origin date and time.
    OriginTime,
    /// Wall clock.
    Clock,
}

impl fmt::Display for DisplayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisplayField::Countdown => "countdown",
            DisplayField::Tips => "tips",
            DisplayField::Epicenter => "epicenter",
            DisplayField::Magnitude => "magnitude",
            DisplayField::OriginTime => "time",
            DisplayField::Clock => "clock",
        };
        f.write_str(label)
    }
}

/// Receives display text. Must not block.
pub trait DisplaySink: Send + Sync {
    fn update(&self, field: DisplayField, text: String);
}

/// An audio clip the dispatcher can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// The alert clip for one sound level.
    Eew(SoundLevel),
    /// One short beep of the final-seconds sequence.
    CountdownBeep,
}

impl Cue {
    /// The asset file backing this cue.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Cue::Eew(SoundLevel::Silent) => "EEW0.wav",
            Cue::Eew(SoundLevel::Low) => "EEW1.wav",
            Cue::Eew(SoundLevel::High) => "EEW2.wav",
            Cue::CountdownBeep => "countdown.wav",
        }
    }
}

/// Plays audio. `play` blocks until the clip has finished, so the dispatcher
/// always calls it from a blocking worker.
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue) -> anyhow::Result<()>;
}

/// Brings the main window to the foreground. May block; the dispatcher
/// calls it from a blocking worker.
pub trait WindowFocus: Send + Sync {
    fn request_focus(&self) -> anyhow::Result<()>;
}

/// Delivers a desktop notification. May block like `WindowFocus`.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> anyhow::Result<()>;
}

/// Supplies the observer configuration, read once per report.
pub trait ObserverSource: Send + Sync {
    fn current(&self) -> Result<ObserverConfig>;

    /// Stores a new configuration. Read-only sources refuse.
    fn replace(&self, _config: ObserverConfig) -> Result<()> {
        Err(SceewError::config_unavailable("observer source is read-only"))
    }
}

/// In-memory observer configuration, seeded from `SceewConfig::observer`.
/// Never fails.
#[derive(Debug, Clone, Default)]
pub struct ObserverStore {
    inner: Arc<RwLock<ObserverConfig>>,
}

impl ObserverStore {
    pub fn new(initial: ObserverConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }
}

impl ObserverSource for ObserverStore {
    fn current(&self) -> Result<ObserverConfig> {
        Ok(self.inner.read().clone())
    }

    fn replace(&self, config: ObserverConfig) -> Result<()> {
        *self.inner.write() = config;
        Ok(())
    }
}

/// The full set of collaborators handed to the engine.
#[derive(Clone)]
pub struct Services {
    pub display: Arc<dyn DisplaySink>,
    pub player: Arc<dyn CuePlayer>,
    pub window: Arc<dyn WindowFocus>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Console display with log-only audio, focus and notifications.
    pub fn console() -> Self {
        Self {
            display: Arc::new(ConsoleDisplay),
            player: Arc::new(LogCuePlayer),
            window: Arc::new(LogWindowFocus),
            notifier: Arc::new(LogNotifier),
        }
    }
}

/// Prints panel updates to stdout. The clock panel only shows at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn update(&self, field: DisplayField, text: String) {
        let text = text.replace('\n', " | ");
        match field {
            DisplayField::Clock => trace!("{}", text),
            DisplayField::Countdown => println!("{} {}", "[countdown]".red().bold(), text.bold()),
            other => println!("{} {}", format!("[{other}]").yellow(), text),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogCuePlayer;

impl CuePlayer for LogCuePlayer {
    fn play(&self, cue: Cue) -> anyhow::Result<()> {
        debug!(asset = cue.asset_name(), "playing cue");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogWindowFocus;

impl WindowFocus for LogWindowFocus {
    fn request_focus(&self) -> anyhow::Result<()> {
        debug!("window focus requested");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> anyhow::Result<()> {
        info!(%title, "{}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_returns_the_latest_saved_observer() {
        let store = ObserverStore::default();
        assert_eq!(store.current().unwrap().latitude, 30.68);

        let moved = ObserverConfig {
            latitude: 29.98,
            ..ObserverConfig::default()
        };
        store.replace(moved.clone()).unwrap();
        assert_eq!(store.current().unwrap(), moved);
    }

    struct ReadOnly;

    impl ObserverSource for ReadOnly {
        fn current(&self) -> Result<ObserverConfig> {
            Ok(ObserverConfig::default())
        }
    }

    #[test]
    fn read_only_source_refuses_saves() {
        let err = ReadOnly.replace(ObserverConfig::default()).unwrap_err();
        assert!(matches!(err, SceewError::ConfigUnavailable(_)));
    }

    #[test]
    fn cue_assets_follow_sound_level() {
        assert_eq!(Cue::Eew(SoundLevel::Silent).asset_name(), "EEW0.wav");
        assert_eq!(Cue::Eew(SoundLevel::High).asset_name(), "EEW2.wav");
        assert_eq!(Cue::CountdownBeep.asset_name(), "countdown.wav");
    }
}
