//! Fan-out of a triggered alert to audio, window focus and notifications.
//!
//! Nothing here blocks the caller. Every collaborator call runs on the
//! blocking pool under the supervisor, and failures are logged and dropped.

use tracing::{debug, warn};

use super::supervisor::Supervisor;
use crate::common::{TaskId, TaskKind};
use crate::config::ObserverConfig;
use crate::estimate::{DerivedAlert, SoundLevel};
use crate::feed::QuakeReport;
use crate::services::{Cue, Services};

/// Number of beeps in the final-seconds sequence.
pub const COUNTDOWN_BEEPS: usize = 15;

/// Notification title for a report.
pub fn notification_title(report: &QuakeReport) -> String {
    format!("Sichuan EEW (report #{})", report.report_num)
}

/// Notification body: the raw report plus the tier-specific advice.
pub fn notification_message(report: &QuakeReport, alert: &DerivedAlert) -> String {
    format!(
        "{} M{:.1} earthquake at {}, max intensity {}, estimated local intensity {:.1}: {}.",
        report.origin_local.format("%Y-%m-%d %H:%M:%S"),
        report.magnitude,
        report.hypocenter,
        report.max_intensity,
        alert.intensity,
        alert.tier.advice(),
    )
}

#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
    supervisor: Supervisor,
}

impl Dispatcher {
    pub fn new(services: Services, supervisor: Supervisor) -> Self {
        Self {
            services,
            supervisor,
        }
    }

    /// Raises the alert for a freshly triggered event.
    pub fn dispatch(&self, report: &QuakeReport, alert: &DerivedAlert, observer: &ObserverConfig) {
        if observer.auto_window {
            self.request_focus();
        }

        if observer.audio_enabled {
            self.play_eew_cue(alert.sound_level);
        }

        if observer.notifications {
            self.notify(notification_title(report), notification_message(report, alert));
        }
    }

    pub fn request_focus(&self) -> TaskId {
        let window = self.services.window.clone();
        self.supervisor.spawn_blocking(TaskKind::WindowFocus, move || {
            if let Err(err) = window.request_focus() {
                warn!(error = %err, "window focus failed");
            }
        })
    }

    pub fn notify(&self, title: String, message: String) -> TaskId {
        let notifier = self.services.notifier.clone();
        self.supervisor.spawn_blocking(TaskKind::Notification, move || {
            if let Err(err) = notifier.notify(&title, &message) {
                warn!(error = %err, "notification delivery failed");
            }
        })
    }

    /// Plays the clip for `level` once, to completion.
    pub fn play_eew_cue(&self, level: SoundLevel) -> TaskId {
        let player = self.services.player.clone();
        self.supervisor.spawn_blocking(TaskKind::EewCue, move || {
            if let Err(err) = player.play(Cue::Eew(level)) {
                warn!(error = %err, level = level.index(), "EEW cue failed");
            }
        })
    }

    /// Plays the short beep back-to-back, each one finishing before the next.
    pub fn play_countdown_cue(&self) -> TaskId {
        let player = self.services.player.clone();
        self.supervisor.spawn_blocking(TaskKind::CountdownCue, move || {
            for beep in 0..COUNTDOWN_BEEPS {
                if let Err(err) = player.play(Cue::CountdownBeep) {
                    warn!(error = %err, beep, "countdown cue failed");
                    return;
                }
            }
            debug!("countdown cue finished");
        })
    }
}
