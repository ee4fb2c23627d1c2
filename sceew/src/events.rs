//! Defines all public event types broadcast by the SCEEW engine.
//!
//! Listeners subscribe to these strongly-typed streams to observe the engine
//! without touching its state: the shell prints them, the tests count them.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::common::{TaskId, TaskKind};
use crate::estimate::{SeverityTier, SoundLevel};

/// Events related to the engine itself and its feed connection.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's `run` loop begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// A WebSocket session was established.
    FeedConnected { url: String },
    /// The WebSocket session ended; a reconnect follows.
    FeedDisconnected { reason: String },
    /// A resync was requested after an observer save.
    ResyncRequested { delivered: bool },
}

/// Decisions taken by the alert session for each inbound message.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    /// First fresh sighting of an event: countdown and dispatch started.
    Triggered {
        origin: DateTime<Utc>,
        report_num: u32,
        distance_km: f64,
        intensity: f64,
        tier: SeverityTier,
        sound_level: SoundLevel,
    },
    /// A refinement of the active event; display only.
    Updated { origin: DateTime<Utc>, report_num: u32 },
    /// Eligible report swallowed by the one-shot suppression after a save.
    Suppressed { origin: DateTime<Utc>, report_num: u32 },
    /// The report's event is older than the freshness window.
    Stale { origin: DateTime<Utc>, report_num: u32, age_secs: i64 },
    /// A heartbeat found the active event expired.
    SessionReset { origin: DateTime<Utc> },
    /// An inbound message or report could not be processed.
    Dropped { reason: String },
}

/// Lifecycle of tasks owned by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Spawned { id: TaskId, kind: TaskKind },
    Finished { id: TaskId, kind: TaskKind },
    Panicked { id: TaskId, kind: TaskKind },
    Aborted { id: TaskId, kind: TaskKind },
}

impl TaskEvent {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskEvent::Spawned { kind, .. }
            | TaskEvent::Finished { kind, .. }
            | TaskEvent::Panicked { kind, .. }
            | TaskEvent::Aborted { kind, .. } => *kind,
        }
    }
}
