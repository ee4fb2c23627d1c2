//! Contains common, primitive types shared across the engine.
//!
//! The identifiers here let the supervisor and the event streams refer to
//! detached tasks without holding on to their join handles.

use serde::Serialize;
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a task registered with the supervisor.
    ///
    /// Keys are never reused, so a stale `TaskId` from a finished countdown
    /// cannot accidentally abort a newer one.
    pub struct TaskId;
}

/// What a supervised task is doing. Used for logging and for counting
/// live tasks of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// The per-event S-wave countdown.
    Countdown,
    /// The alert clip selected by sound level.
    EewCue,
    /// The rapid "final seconds" beep sequence.
    CountdownCue,
    /// Raising the main window.
    WindowFocus,
    /// Delivering the OS notification.
    Notification,
    /// The one-second wall-clock display ticker.
    ClockPanel,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskKind::Countdown => "countdown",
            TaskKind::EewCue => "eew-cue",
            TaskKind::CountdownCue => "countdown-cue",
            TaskKind::WindowFocus => "window-focus",
            TaskKind::Notification => "notification",
            TaskKind::ClockPanel => "clock-panel",
        };
        f.write_str(label)
    }
}

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}
