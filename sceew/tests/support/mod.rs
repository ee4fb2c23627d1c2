//! Recording collaborators and payload builders shared by the integration
//! tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use sceew::config::ObserverConfig;
use sceew::error::SceewError;
use sceew::services::{
    Cue, CuePlayer, DisplayField, DisplaySink, Notifier, ObserverSource, Services, WindowFocus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct RecordingDisplay {
    updates: Mutex<Vec<(DisplayField, String)>>,
}

impl RecordingDisplay {
    pub fn last(&self, field: DisplayField) -> Option<String> {
        self.updates
            .lock()
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map(|(_, text)| text.clone())
    }

    /// Updates excluding the clock panel.
    pub fn panel_updates(&self) -> usize {
        self.updates
            .lock()
            .iter()
            .filter(|(f, _)| *f != DisplayField::Clock)
            .count()
    }
}

impl DisplaySink for RecordingDisplay {
    fn update(&self, field: DisplayField, text: String) {
        self.updates.lock().push((field, text));
    }
}

#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<Cue>>,
}

impl RecordingPlayer {
    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().clone()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.played.lock().iter().filter(|c| **c == cue).count()
    }
}

impl CuePlayer for RecordingPlayer {
    fn play(&self, cue: Cue) -> anyhow::Result<()> {
        self.played.lock().push(cue);
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingWindow {
    focused: Mutex<usize>,
}

impl CountingWindow {
    pub fn count(&self) -> usize {
        *self.focused.lock()
    }
}

impl WindowFocus for CountingWindow {
    fn request_focus(&self) -> anyhow::Result<()> {
        *self.focused.lock() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) -> anyhow::Result<()> {
        self.sent.lock().push((title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Sleeps before recording, like a desktop notifier waiting on D-Bus.
pub struct SlowNotifier {
    pub delay: Duration,
    pub inner: RecordingNotifier,
}

impl Notifier for SlowNotifier {
    fn notify(&self, title: &str, message: &str) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        self.inner.notify(title, message)
    }
}

/// An observer source backed by settings that cannot be read until a save
/// succeeds.
#[derive(Default)]
pub struct UnreadableObserver {
    saved: Mutex<Option<ObserverConfig>>,
}

impl ObserverSource for UnreadableObserver {
    fn current(&self) -> sceew::error::Result<ObserverConfig> {
        self.saved
            .lock()
            .clone()
            .ok_or_else(|| SceewError::config_unavailable("settings file is unreadable"))
    }

    fn replace(&self, config: ObserverConfig) -> sceew::error::Result<()> {
        *self.saved.lock() = Some(config);
        Ok(())
    }
}

/// A full set of recording collaborators plus the `Services` wrapping them.
pub struct Recorders {
    pub display: Arc<RecordingDisplay>,
    pub player: Arc<RecordingPlayer>,
    pub window: Arc<CountingWindow>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: Services,
}

impl Recorders {
    pub fn new() -> Self {
        let display = Arc::new(RecordingDisplay::default());
        let player = Arc::new(RecordingPlayer::default());
        let window = Arc::new(CountingWindow::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            display: display.clone(),
            player: player.clone(),
            window: window.clone(),
            notifier: notifier.clone(),
        };
        Self {
            display,
            player,
            window,
            notifier,
            services,
        }
    }
}

/// 2024-05-01 12:00:00 in Asia/Shanghai.
pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()
}

pub const ORIGIN_TEXT: &str = "2024-05-01 12:00:00";

/// Default observer in Chengdu with every switch on.
pub fn observer() -> ObserverConfig {
    ObserverConfig {
        name: "Chengdu".to_string(),
        ..ObserverConfig::default()
    }
}

/// An M5.0 report roughly 100 km due north of the default observer.
pub fn report(report_num: u32) -> String {
    report_at(ORIGIN_TEXT, report_num)
}

pub fn report_at(origin_time: &str, report_num: u32) -> String {
    json!({
        "ID": 20240501,
        "type": "sc_eew",
        "ReportTime": origin_time,
        "ReportNum": report_num,
        "OriginTime": origin_time,
        "HypoCenter": "四川阿坝州汶川县",
        "Latitude": 31.58,
        "Longitude": 104.05,
        "Magunitude": 5.0,
        "Depth": null,
        "MaxIntensity": 6.0,
    })
    .to_string()
}

pub fn heartbeat() -> String {
    json!({ "type": "heartbeat", "ver": "1.0.0" }).to_string()
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// A local feed server bound to an ephemeral port.
pub struct FeedServer {
    listener: tokio::net::TcpListener,
    pub url: String,
}

pub type ServerSocket = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

impl FeedServer {
    pub async fn bind() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        Self { listener, url }
    }

    pub async fn accept(&self) -> ServerSocket {
        let (stream, _) = self.listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    /// Feed settings pointing at this server with short test timings.
    pub fn feed_config(&self) -> sceew::config::FeedConfig {
        sceew::config::FeedConfig {
            url: self.url.clone(),
            reconnect_delay_ms: 50,
            connect_timeout_secs: 2,
            stall_timeout_secs: 1,
            ..Default::default()
        }
    }
}

/// Next text frame from the client, skipping control frames.
pub async fn next_text(socket: &mut ServerSocket) -> String {
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(_)) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

pub async fn send_text(socket: &mut ServerSocket, text: String) {
    use futures_util::SinkExt;
    socket
        .send(tokio_tungstenite::tungstenite::Message::text(text))
        .await
        .unwrap();
}
