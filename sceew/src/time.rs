//! Wall-clock access and feed timestamp handling.
//!
//! Every age and countdown computation goes through a [`Clock`] so the state
//! machine and the countdown can be driven deterministically in tests.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::error::{Result, SceewError};
use crate::services::{DisplayField, DisplaySink};

/// The format of `OriginTime` in feed reports.
pub const ORIGIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Parses a feed `OriginTime` expressed as local wall-clock time in `tz`.
///
/// Returns the naive local time (kept for display) and the absolute instant.
pub fn parse_origin_time(text: &str, tz: Tz) -> Result<(NaiveDateTime, DateTime<Utc>)> {
    let local = NaiveDateTime::parse_from_str(text.trim(), ORIGIN_TIME_FORMAT)
        .map_err(|e| SceewError::parse(format!("OriginTime {text:?}: {e}")))?;
    let instant = tz
        .from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| SceewError::parse(format!("OriginTime {text:?} does not exist in {tz}")))?
        .with_timezone(&Utc);
    Ok((local, instant))
}

/// Whole seconds elapsed from `origin` to `now`, clamped at zero.
///
/// An origin in the future (clock skew between feed and host) counts as a
/// brand-new event rather than a negative age.
pub fn event_age_secs(origin: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - origin).num_seconds().max(0)
}

/// Renders the clock panel text for `now` in the feed's timezone.
pub fn clock_panel_text(now: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "Sichuan Earthquake Administration  {}  China EEW Network",
        now.with_timezone(&tz).format("%H:%M:%S")
    )
}

/// Keeps the clock panel updated once per second, forever.
///
/// Runs independently of the feed so the display stays live while the
/// connector is failing.
pub async fn run_clock_panel(clock: Arc<dyn Clock>, tz: Tz, display: Arc<dyn DisplaySink>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let text = clock_panel_text(clock.now(), tz);
        trace!("clock panel: {}", text);
        display.update(DisplayField::Clock, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_time_is_read_in_feed_timezone() {
        let (local, instant) = parse_origin_time("2024-05-01 12:00:00", Tz::Asia__Shanghai).unwrap();
        assert_eq!(local.to_string(), "2024-05-01 12:00:00");
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn malformed_origin_time_is_a_parse_error() {
        let err = parse_origin_time("2024/05/01 12:00", Tz::Asia__Shanghai).unwrap_err();
        assert!(matches!(err, SceewError::Parse(_)));
    }

    #[test]
    fn negative_age_clamps_to_zero() {
        let origin = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        let before = origin - chrono::Duration::seconds(30);
        let after = origin + chrono::Duration::milliseconds(301_900);
        assert_eq!(event_age_secs(origin, before), 0);
        assert_eq!(event_age_secs(origin, after), 301);
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(5));
    }

    #[test]
    fn clock_panel_uses_local_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 7).unwrap();
        assert!(clock_panel_text(now, Tz::Asia__Shanghai).contains("12:00:07"));
    }
}
