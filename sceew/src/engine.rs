//! The core engine that orchestrates the entire SCEEW client.

use chrono_tz::Tz;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::common::TaskKind;
use crate::components::countdown::{arrived_text, Countdown};
use crate::components::dispatcher::Dispatcher;
use crate::components::supervisor::Supervisor;
use crate::config::{ObserverConfig, SceewConfig};
use crate::error::Result;
use crate::estimate::DerivedAlert;
use crate::events::{AlertEvent, SystemEvent, TaskEvent};
use crate::feed::{classify, FeedConnector, FeedMessage, QuakeReport, ResyncHandle};
use crate::services::{DisplayField, ObserverSource, ObserverStore, Services};
use crate::session::{AlertSession, ReportVerdict, SessionSnapshot};
use crate::time::{run_clock_panel, Clock, SystemClock};
use crate::ENGINE_NAME;

const CHANNEL_CAPACITY: usize = 256;

/// Out-of-band requests for the message loop.
#[derive(Debug)]
pub enum Control {
    /// Store a new observer configuration, arm the one-shot suppression and
    /// request a resync, all between two messages.
    SaveObserver(ObserverConfig, oneshot::Sender<Result<()>>),
    /// Read the observer the next report will be evaluated against.
    Observer(oneshot::Sender<Result<ObserverConfig>>),
    /// Process a payload as if it had arrived on the feed.
    Inject(String),
    /// Ask the feed to resend its latest report.
    Resync,
    /// Report the current session state.
    Snapshot(oneshot::Sender<SessionSnapshot>),
    /// Stop the engine.
    Shutdown,
}

/// A cloneable handle for talking to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    control: mpsc::Sender<Control>,
    resync: ResyncHandle,
}

impl EngineHandle {
    async fn send(&self, control: Control) -> anyhow::Result<()> {
        self.control
            .send(control)
            .await
            .map_err(|_| anyhow::anyhow!("{ENGINE_NAME} engine is not running"))
    }

    /// Saves the observer configuration (the settings-dialog path).
    pub async fn save_observer(&self, config: ObserverConfig) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::SaveObserver(config, tx)).await?;
        Ok(rx.await??)
    }

    /// The observer the engine currently holds.
    pub async fn observer(&self) -> anyhow::Result<ObserverConfig> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Observer(tx)).await?;
        Ok(rx.await??)
    }

    /// Feeds a raw payload through the classifier and the session.
    pub async fn inject(&self, raw: impl Into<String>) -> anyhow::Result<()> {
        self.send(Control::Inject(raw.into())).await
    }

    pub async fn resync(&self) -> anyhow::Result<()> {
        self.send(Control::Resync).await
    }

    pub async fn snapshot(&self) -> anyhow::Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Snapshot(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(Control::Shutdown).await
    }

    /// `true` while the feed connection is up.
    pub fn is_connected(&self) -> bool {
        self.resync.is_connected()
    }
}

/// The message-processing path: classifier, estimator, session and the
/// spawning of countdowns and dispatches.
///
/// Owns the only `AlertSession`. Every method runs to completion without
/// awaiting, so heartbeats are never held up by alert work.
pub struct Pipeline {
    session: AlertSession,
    observer: Arc<dyn ObserverSource>,
    services: Services,
    dispatcher: Dispatcher,
    supervisor: Supervisor,
    clock: Arc<dyn Clock>,
    tz: Tz,
    alert_events: broadcast::Sender<AlertEvent>,
}

impl Pipeline {
    pub fn new(
        observer: Arc<dyn ObserverSource>,
        services: Services,
        clock: Arc<dyn Clock>,
        tz: Tz,
        supervisor: Supervisor,
        alert_events: broadcast::Sender<AlertEvent>,
    ) -> Self {
        Self {
            session: AlertSession::new(),
            observer,
            dispatcher: Dispatcher::new(services.clone(), supervisor.clone()),
            services,
            supervisor,
            clock,
            tz,
            alert_events,
        }
    }

    pub fn session(&self) -> &AlertSession {
        &self.session
    }

    /// Processes one payload, logging instead of returning failures.
    pub fn process_frame(&mut self, raw: &str) {
        if let Err(err) = self.handle_frame(raw) {
            warn!(error = %err, "dropping feed message");
            self.alert_events
                .send(AlertEvent::Dropped {
                    reason: err.to_string(),
                })
                .ok();
        }
    }

    pub fn handle_frame(&mut self, raw: &str) -> Result<()> {
        match classify(raw, self.tz)? {
            FeedMessage::Heartbeat => {
                self.handle_heartbeat();
                Ok(())
            }
            FeedMessage::Report(report) => self.handle_report(report).map(|_| ()),
        }
    }

    pub fn handle_heartbeat(&mut self) {
        if let Some(origin) = self.session.observe_heartbeat(self.clock.now()) {
            info!(%origin, "active event expired; session idle");
            self.alert_events
                .send(AlertEvent::SessionReset { origin })
                .ok();
        }
    }

    pub fn handle_report(&mut self, report: QuakeReport) -> Result<ReportVerdict> {
        let observer = self.observer.current()?;
        let alert = DerivedAlert::compute(&report, observer.location());
        info!(
            report_num = report.report_num,
            hypocenter = %report.hypocenter,
            magnitude = report.magnitude,
            distance_km = alert.distance_km,
            intensity = alert.intensity,
            tier = %alert.tier,
            "report received"
        );
        self.render_report(&report, &alert);

        let verdict = self.session.observe_report(report.origin, self.clock.now());
        let origin = report.origin;
        let report_num = report.report_num;
        match verdict {
            ReportVerdict::Trigger => {
                let countdown = Countdown::new(
                    observer.name.clone(),
                    report.origin,
                    alert.distance_km,
                    observer.audio_enabled,
                );
                self.supervisor.spawn(
                    TaskKind::Countdown,
                    countdown.run(
                        self.clock.clone(),
                        self.services.display.clone(),
                        self.dispatcher.clone(),
                    ),
                );
                self.dispatcher.dispatch(&report, &alert, &observer);
                self.alert_events
                    .send(AlertEvent::Triggered {
                        origin,
                        report_num,
                        distance_km: alert.distance_km,
                        intensity: alert.intensity,
                        tier: alert.tier,
                        sound_level: alert.sound_level,
                    })
                    .ok();
            }
            ReportVerdict::AlreadyActive => {
                debug!(report_num, "refinement of active event");
                self.alert_events
                    .send(AlertEvent::Updated { origin, report_num })
                    .ok();
            }
            ReportVerdict::Suppressed => {
                info!(report_num, "alert suppressed after observer change");
                self.alert_events
                    .send(AlertEvent::Suppressed { origin, report_num })
                    .ok();
            }
            ReportVerdict::Stale { age_secs } => {
                debug!(report_num, age_secs, "stale report");
                self.services
                    .display
                    .update(DisplayField::Countdown, arrived_text(&observer.name));
                self.alert_events
                    .send(AlertEvent::Stale {
                        origin,
                        report_num,
                        age_secs,
                    })
                    .ok();
            }
        }
        Ok(verdict)
    }

    pub fn observer(&self) -> Result<ObserverConfig> {
        self.observer.current()
    }

    /// Stores a new observer and arms the one-shot suppression.
    pub fn save_observer(&mut self, config: ObserverConfig) -> Result<()> {
        info!(observer = %config.name, lat = config.latitude, lon = config.longitude, "observer saved");
        self.observer.replace(config)?;
        self.session.mark_config_changed();
        Ok(())
    }

    fn render_report(&self, report: &QuakeReport, alert: &DerivedAlert) {
        let display = &self.services.display;
        display.update(
            DisplayField::Epicenter,
            format!("Epicenter\n{}\n{}km", report.hypocenter, alert.distance_km as i64),
        );
        display.update(
            DisplayField::Magnitude,
            format!("Magnitude\nM{}\nMax intensity {}", report.magnitude, report.max_intensity),
        );
        display.update(
            DisplayField::OriginTime,
            format!(
                "Time\n{}\n{}",
                report.origin_local.format("%Y.%m.%d"),
                report.origin_local.format("%H:%M:%S")
            ),
        );
        display.update(
            DisplayField::Tips,
            format!("Local intensity {:.1}: {}", alert.intensity, alert.tier.advice()),
        );
    }
}

/// The main SCEEW engine.
///
/// Holds the configuration and collaborators, owns the feed connector, and
/// drives the single message loop that all session changes go through.
pub struct SceewEngine {
    config: Arc<SceewConfig>,
    services: Services,
    observer: Arc<dyn ObserverSource>,
    clock: Arc<dyn Clock>,
    connector: FeedConnector,
    resync: ResyncHandle,
    supervisor: Supervisor,
    system_event_sender: broadcast::Sender<SystemEvent>,
    alert_event_sender: broadcast::Sender<AlertEvent>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
}

impl SceewEngine {
    /// Creates a new engine. The observer starts from the `[observer]`
    /// section of the configuration.
    pub fn new(config: SceewConfig, services: Services) -> Self {
        let (system_event_sender, _) = broadcast::channel(64);
        let (alert_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (task_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(64);
        let (connector, resync) = FeedConnector::new(config.feed.clone(), system_event_sender.clone());
        let observer: Arc<dyn ObserverSource> = Arc::new(ObserverStore::new(config.observer.clone()));

        Self {
            config: Arc::new(config),
            services,
            observer,
            clock: Arc::new(SystemClock),
            connector,
            resync,
            supervisor: Supervisor::new(task_event_sender),
            system_event_sender,
            alert_event_sender,
            control_tx,
            control_rx,
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the in-memory observer store.
    pub fn with_observer_source(mut self, observer: Arc<dyn ObserverSource>) -> Self {
        self.observer = observer;
        self
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            control: self.control_tx.clone(),
            resync: self.resync.clone(),
        }
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `AlertEvent` stream.
    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_event_sender.subscribe()
    }

    /// Subscribes to the `TaskEvent` stream.
    pub fn subscribe_task_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.supervisor.subscribe()
    }

    /// Runs the engine until Ctrl+C or a `Control::Shutdown`.
    ///
    /// This method will:
    /// 1. Spawn the feed connector and the clock panel.
    /// 2. Process feed frames and control requests one at a time.
    /// 3. Abort every remaining task on the way out.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("{} engine starting up...", ENGINE_NAME);
        let Self {
            config,
            services,
            observer,
            clock,
            connector,
            resync,
            supervisor,
            system_event_sender,
            alert_event_sender,
            control_tx,
            mut control_rx,
        } = self;
        drop(control_tx);

        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let connector_task = tokio::spawn(connector.run(frame_tx));

        let tz = config.feed.timezone;
        supervisor.spawn(
            TaskKind::ClockPanel,
            run_clock_panel(clock.clone(), tz, services.display.clone()),
        );

        let mut pipeline = Pipeline::new(
            observer,
            services,
            clock,
            tz,
            supervisor.clone(),
            alert_event_sender,
        );

        system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();
        info!(url = %config.feed.url, "Engine running. Press Ctrl+C to shut down.");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                biased;
                signal = &mut ctrl_c => {
                    if let Err(err) = signal {
                        error!(error = %err, "failed to listen for Ctrl+C");
                    }
                    info!("Shutdown signal received.");
                    break;
                }
                Some(control) = control_rx.recv() => {
                    if apply_control(&mut pipeline, &resync, &system_event_sender, control).is_break() {
                        info!("Shutdown requested.");
                        break;
                    }
                }
                Some(frame) = frame_rx.recv() => pipeline.process_frame(&frame),
                else => break,
            }
        }

        connector_task.abort();
        supervisor.shutdown();
        system_event_sender.send(SystemEvent::EngineShutdown).ok();
        info!("{} engine has shut down.", ENGINE_NAME);
        Ok(())
    }
}

fn apply_control(
    pipeline: &mut Pipeline,
    resync: &ResyncHandle,
    system_events: &broadcast::Sender<SystemEvent>,
    control: Control,
) -> ControlFlow<()> {
    match control {
        Control::SaveObserver(config, reply) => {
            let result = pipeline.save_observer(config);
            match &result {
                Ok(()) => request_resync(resync, system_events),
                Err(err) => warn!(error = %err, "observer save rejected"),
            }
            reply.send(result).ok();
        }
        Control::Observer(reply) => {
            reply.send(pipeline.observer()).ok();
        }
        Control::Inject(raw) => pipeline.process_frame(&raw),
        Control::Resync => request_resync(resync, system_events),
        Control::Snapshot(reply) => {
            reply.send(pipeline.session().snapshot()).ok();
        }
        Control::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

fn request_resync(resync: &ResyncHandle, system_events: &broadcast::Sender<SystemEvent>) {
    let delivered = resync.request();
    system_events
        .send(SystemEvent::ResyncRequested { delivered })
        .ok();
}

