//! The per-event S-wave countdown.
//!
//! A countdown is bound to one event and owns a snapshot of everything it
//! needs, so it never reads the session after it is spawned. It ends on its
//! own once the wave has arrived or the estimate is out of range.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::dispatcher::Dispatcher;
use crate::services::{DisplayField, DisplaySink};
use crate::time::Clock;

/// Constant S-wave propagation speed, km/s.
pub const S_WAVE_KM_PER_SEC: f64 = 4.0;

/// Any remaining time at or above this is treated as a bogus estimate.
pub const MAX_COUNTDOWN_SECS: i64 = 1200;

/// The remaining time at which the final-seconds cue fires.
pub const IMMINENT_AT_SECS: i64 = 9;

/// Seconds for the S-wave to travel `distance_km`.
pub fn eta_seconds(distance_km: f64) -> f64 {
    distance_km / S_WAVE_KM_PER_SEC
}

/// Text shown once the wave is due.
pub fn arrived_text(observer_name: &str) -> String {
    format!("S-wave has reached {observer_name}")
}

/// Text shown while counting down.
pub fn progress_text(observer_name: &str, remaining: i64) -> String {
    format!("S-wave reaches {observer_name} in {remaining} s")
}

/// The result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    Progress { remaining: i64, imminent: bool },
    Arrived,
}

/// Countdown state for one event.
#[derive(Debug, Clone)]
pub struct Countdown {
    observer_name: String,
    arrival: DateTime<Utc>,
    audio_enabled: bool,
    imminent_fired: bool,
}

impl Countdown {
    pub fn new(
        observer_name: impl Into<String>,
        origin: DateTime<Utc>,
        distance_km: f64,
        audio_enabled: bool,
    ) -> Self {
        let eta_ms = (eta_seconds(distance_km) * 1000.0).round() as i64;
        Self {
            observer_name: observer_name.into(),
            arrival: origin + TimeDelta::milliseconds(eta_ms),
            audio_enabled,
            imminent_fired: false,
        }
    }

    pub fn arrival(&self) -> DateTime<Utc> {
        self.arrival
    }

    pub fn observer_name(&self) -> &str {
        &self.observer_name
    }

    /// Whole seconds until arrival, truncated toward zero.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        (self.arrival - now).num_milliseconds() / 1000
    }

    /// Advances the countdown to `now`.
    pub fn step(&mut self, now: DateTime<Utc>) -> CountdownStep {
        let remaining = self.remaining_at(now);
        if remaining <= 0 || remaining >= MAX_COUNTDOWN_SECS {
            return CountdownStep::Arrived;
        }
        let imminent = remaining == IMMINENT_AT_SECS && !self.imminent_fired;
        if imminent {
            self.imminent_fired = true;
        }
        CountdownStep::Progress {
            remaining,
            imminent,
        }
    }

    /// Ticks once per second until the wave arrives.
    pub async fn run(
        mut self,
        clock: Arc<dyn Clock>,
        display: Arc<dyn DisplaySink>,
        dispatcher: Dispatcher,
    ) {
        info!(
            observer = %self.observer_name,
            arrival = %self.arrival,
            "countdown started"
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.step(clock.now()) {
                CountdownStep::Arrived => {
                    display.update(DisplayField::Countdown, arrived_text(&self.observer_name));
                    break;
                }
                CountdownStep::Progress {
                    remaining,
                    imminent,
                } => {
                    display.update(
                        DisplayField::Countdown,
                        progress_text(&self.observer_name, remaining),
                    );
                    if imminent && self.audio_enabled {
                        dispatcher.play_countdown_cue();
                    }
                }
            }
        }
        debug!(observer = %self.observer_name, "countdown finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
    }

    #[test]
    fn forty_km_arrives_after_ten_seconds() {
        assert_eq!(eta_seconds(40.0), 10.0);
        let mut countdown = Countdown::new("Chengdu", origin(), 40.0, true);
        assert_eq!(countdown.arrival(), origin() + TimeDelta::seconds(10));
        assert_eq!(
            countdown.step(origin() + TimeDelta::seconds(10)),
            CountdownStep::Arrived
        );
        assert_eq!(countdown.remaining_at(origin() + TimeDelta::seconds(10)), 0);
    }

    #[test]
    fn remaining_truncates_partial_seconds() {
        let countdown = Countdown::new("Chengdu", origin(), 40.0, true);
        let now = origin() + TimeDelta::milliseconds(1_300);
        assert_eq!(countdown.remaining_at(now), 8);
        let late = origin() + TimeDelta::milliseconds(10_400);
        assert_eq!(countdown.remaining_at(late), 0);
    }

    #[test]
    fn imminent_fires_exactly_once_at_nine() {
        let mut countdown = Countdown::new("Chengdu", origin(), 100.0, true);
        let mut fired_at = Vec::new();
        let mut now = origin();
        loop {
            match countdown.step(now) {
                CountdownStep::Arrived => break,
                CountdownStep::Progress { remaining, imminent } => {
                    if imminent {
                        fired_at.push(remaining);
                    }
                }
            }
            now += TimeDelta::seconds(1);
        }
        assert_eq!(fired_at, vec![IMMINENT_AT_SECS]);
    }

    #[test]
    fn revisiting_nine_does_not_refire() {
        let mut countdown = Countdown::new("Chengdu", origin(), 100.0, true);
        let at_nine = countdown.arrival() - TimeDelta::milliseconds(9_500);
        assert_eq!(
            countdown.step(at_nine),
            CountdownStep::Progress { remaining: 9, imminent: true }
        );
        assert_eq!(
            countdown.step(at_nine + TimeDelta::milliseconds(400)),
            CountdownStep::Progress { remaining: 9, imminent: false }
        );
    }

    #[test]
    fn out_of_range_estimate_is_treated_as_arrived() {
        let mut far = Countdown::new("Chengdu", origin(), 4.0 * 1300.0, true);
        assert_eq!(far.step(origin()), CountdownStep::Arrived);

        let mut past = Countdown::new("Chengdu", origin(), 40.0, true);
        assert_eq!(past.step(origin() + TimeDelta::seconds(30)), CountdownStep::Arrived);
    }

    #[test]
    fn texts_carry_observer_name() {
        assert_eq!(progress_text("Chengdu", 12), "S-wave reaches Chengdu in 12 s");
        assert_eq!(arrived_text("Chengdu"), "S-wave has reached Chengdu");
    }
}
