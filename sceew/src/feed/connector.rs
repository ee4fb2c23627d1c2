//! The persistent WebSocket subscription.
//!
//! The connector never gives up: every failure is logged, followed by a fixed
//! pause and a fresh attempt. It only returns once the receiving side of its
//! frame channel is gone, which happens at process shutdown.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{ConnectionError, SceewError};
use crate::events::SystemEvent;

/// Requests a resync on the live connection, if there is one.
///
/// Cloneable and cheap. The connector attaches a fresh outbound queue on
/// every successful connect and detaches it when the connection dies, so a
/// request made while disconnected is simply dropped.
#[derive(Debug, Clone, Default)]
pub struct ResyncHandle {
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<()>>>>,
}

impl ResyncHandle {
    /// Queues a resync request. Returns `false` when no connection exists.
    pub fn request(&self) -> bool {
        let queued = match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        };
        if !queued {
            debug!("resync requested while disconnected; ignoring");
        }
        queued
    }

    /// `true` while a connection is established.
    pub fn is_connected(&self) -> bool {
        self.outbound
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn attach(&self) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(tx);
        rx
    }

    fn detach(&self) {
        self.outbound.lock().take();
    }
}

/// Maintains the feed subscription and forwards every text frame.
pub struct FeedConnector {
    config: FeedConfig,
    resync: ResyncHandle,
    system_events: broadcast::Sender<SystemEvent>,
}

/// Why a connection session ended.
enum SessionEnd {
    /// The frame receiver was dropped; the connector should stop.
    ReceiverGone,
}

impl FeedConnector {
    /// Creates a connector and the handle used to request resyncs on it.
    pub fn new(
        config: FeedConfig,
        system_events: broadcast::Sender<SystemEvent>,
    ) -> (Self, ResyncHandle) {
        let resync = ResyncHandle::default();
        let connector = Self {
            config,
            resync: resync.clone(),
            system_events,
        };
        (connector, resync)
    }

    /// Connects, forwards frames, and reconnects after any failure.
    pub async fn run(self, frames: mpsc::Sender<String>) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let result = self.session(&frames).await;
            self.resync.detach();
            match result {
                Ok(SessionEnd::ReceiverGone) => {
                    info!("frame receiver dropped; stopping feed connector");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, attempt, url = %self.config.url, "feed connection lost");
                    self.system_events
                        .send(SystemEvent::FeedDisconnected {
                            reason: err.to_string(),
                        })
                        .ok();
                }
            }
            sleep(self.config.reconnect_delay()).await;
        }
    }

    async fn session(&self, frames: &mpsc::Sender<String>) -> Result<SessionEnd, SceewError> {
        let connect_timeout = self.config.connect_timeout();
        let (socket, _response) = timeout(connect_timeout, connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| ConnectionError::HandshakeTimeout(connect_timeout))??;
        info!(url = %self.config.url, "connected to EEW feed");

        let (mut sink, mut stream) = socket.split();
        let mut resync_rx = self.resync.attach();
        self.system_events
            .send(SystemEvent::FeedConnected {
                url: self.config.url.clone(),
            })
            .ok();

        sink.send(self.resync_frame()).await?;
        debug!("initial resync sent");

        let stall_timeout = self.config.stall_timeout();
        loop {
            tokio::select! {
                Some(()) = resync_rx.recv() => {
                    sink.send(self.resync_frame()).await?;
                    info!("resync sent");
                }
                next = timeout(stall_timeout, stream.next()) => {
                    let frame = next.map_err(|_| ConnectionError::Stalled(stall_timeout))?;
                    let text = match frame {
                        None => return Err(ConnectionError::Closed.into()),
                        Some(Err(err)) => return Err(err.into()),
                        Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "close frame received");
                            return Err(ConnectionError::Closed.into());
                        }
                        Some(Ok(_)) => continue,
                    };
                    if frames.send(text).await.is_err() {
                        return Ok(SessionEnd::ReceiverGone);
                    }
                }
            }
        }
    }

    fn resync_frame(&self) -> Message {
        Message::Text(self.config.resync_message.clone().into())
    }
}
