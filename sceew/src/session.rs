//! The alert session: decides which reports may raise an alert.
//!
//! Reports for one physical event keep arriving as the feed refines its
//! estimate. Only the first fresh sighting is allowed to start a countdown and
//! make noise; the rest just refresh the display. The session goes back to
//! idle on the first heartbeat after the active event has aged out.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::time::event_age_secs;

/// Age at which an event no longer counts as in progress, in seconds.
pub const STALE_AFTER_SECS: i64 = 300;

/// What the session decided for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVerdict {
    /// IDLE to ACTIVE: start the countdown and dispatch the alert.
    Trigger,
    /// Already ACTIVE: update the display only.
    AlreadyActive,
    /// Eligible, but swallowed by the one-shot suppression.
    Suppressed,
    /// The event is too old; show it as already arrived.
    Stale { age_secs: i64 },
}

/// Read-only view of the session, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub event_time: Option<DateTime<Utc>>,
    pub suppressed_once: bool,
}

#[derive(Debug, Default)]
pub struct AlertSession {
    active: bool,
    event_time: Option<DateTime<Utc>>,
    suppressed_once: bool,
}

impl AlertSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.event_time
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.active,
            event_time: self.event_time,
            suppressed_once: self.suppressed_once,
        }
    }

    /// Arms the one-shot suppression after the observer configuration changed.
    pub fn mark_config_changed(&mut self) {
        self.suppressed_once = true;
    }

    /// Applies one report whose event originated at `origin`.
    ///
    /// The suppression flag is consumed by whichever report comes next,
    /// stale or not.
    pub fn observe_report(&mut self, origin: DateTime<Utc>, now: DateTime<Utc>) -> ReportVerdict {
        let suppressed = std::mem::take(&mut self.suppressed_once);
        let age_secs = event_age_secs(origin, now);
        if age_secs >= STALE_AFTER_SECS {
            return ReportVerdict::Stale { age_secs };
        }
        if suppressed {
            return ReportVerdict::Suppressed;
        }
        if self.active {
            self.event_time = Some(origin);
            return ReportVerdict::AlreadyActive;
        }
        self.active = true;
        self.event_time = Some(origin);
        ReportVerdict::Trigger
    }

    /// Applies a heartbeat. Returns the origin of the event that expired, if
    /// the session went back to idle.
    pub fn observe_heartbeat(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.active {
            return None;
        }
        let origin = self.event_time?;
        // Sub-second resolution: 300.4 s is already past the window.
        if (now - origin).num_milliseconds() > STALE_AFTER_SECS * 1000 {
            self.active = false;
            Some(origin)
        } else {
            None
        }
    }
}
